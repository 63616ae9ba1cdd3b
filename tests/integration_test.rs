//! Integration tests for the search/annotate flow.
//!
//! A stub backend is served with axum on a random local port, and the real
//! reqwest client talks to it.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use repo_ask::client::{Backend, HttpBackend};
use repo_ask::config::Config;
use repo_ask::models::{CommentRequest, LineRange, SearchRequest};
use repo_ask::session::{SessionState, SEARCH_ERROR_MESSAGE};
use repo_ask::state::{AppState, QuestionOutcome};

/// Request bodies the stub received, by endpoint.
#[derive(Clone, Default)]
struct Recorded {
    searches: Arc<Mutex<Vec<Value>>>,
    comments: Arc<Mutex<Vec<Value>>>,
}

async fn widgets_search(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    rec.searches.lock().push(body);
    Json(json!({
        "auth.py": [{"10:25": "def authenticate(request):\n    token = request.headers['Authorization']\n    return validate(token)"}],
        "api/routes.py": [{"1:3": "from auth import authenticate\n\nroutes = []"}]
    }))
}

async fn tokens_comment(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    rec.comments.lock().push(body);
    Json(json!({"response": "It validates tokens."}))
}

async fn server_error() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "Traceback (most recent call last): ...")
}

async fn wrong_shape() -> Json<Value> {
    Json(json!({"auth.py": "def authenticate(): ..."}))
}

async fn not_json() -> &'static str {
    "<html>oops</html>"
}

/// Serve `router` on 127.0.0.1 and return a config pointing at it.
async fn spawn_backend(router: Router) -> Config {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Config {
        base_url: format!("http://{addr}"),
        ..Config::default()
    }
}

async fn widgets_backend() -> (Config, Recorded) {
    let rec = Recorded::default();
    let router = Router::new()
        .route("/api/search", post(widgets_search))
        .route("/api/comment", post(tokens_comment))
        .with_state(rec.clone());
    (spawn_backend(router).await, rec)
}

#[tokio::test]
async fn test_http_search_preserves_file_order() {
    let (config, rec) = widgets_backend().await;
    let backend = HttpBackend::new(&config).unwrap();

    let result = backend
        .search(&SearchRequest {
            github_url: "github.com/acme/widgets".to_string(),
            query: "Where is auth handled?".to_string(),
        })
        .await
        .unwrap();

    let paths: Vec<&str> = result.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, ["auth.py", "api/routes.py"]);
    assert_eq!(
        result.files[0].snippets[0].entries[0].range,
        LineRange { start: 10, end: 25 }
    );

    assert_eq!(
        rec.searches.lock()[0],
        json!({"github_url": "github.com/acme/widgets", "query": "Where is auth handled?"})
    );
}

#[tokio::test]
async fn test_http_comment_returns_response_text() {
    let (config, rec) = widgets_backend().await;
    let backend = HttpBackend::new(&config).unwrap();

    let answer = backend
        .comment(&CommentRequest {
            query: "What is this?".to_string(),
            current_context: None,
            current_file: None,
            current_line: None,
        })
        .await
        .unwrap();
    assert_eq!(answer, "It validates tokens.");
    assert!(rec.comments.lock()[0]["current_context"].is_null());
}

#[tokio::test]
async fn test_full_annotation_flow() {
    let (config, rec) = widgets_backend().await;
    let app = AppState::new(config).unwrap();

    let state = app
        .submit("github.com/acme/widgets", "Where is auth handled?")
        .await;
    assert!(matches!(state, SessionState::Ready(_)));

    let range = app.block_range("auth.py", 1).unwrap();
    assert!(app.open_dialog_at("auth.py", range, 3));
    assert_eq!(
        app.submit_question("What does this do?").await,
        QuestionOutcome::Answered("It validates tokens.".to_string())
    );
    assert!(app.commit());

    let thread = app.thread("auth.py", 12);
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].question, "What does this do?");
    assert_eq!(thread[0].answer, "It validates tokens.");

    {
        let comments = rec.comments.lock();
        assert_eq!(comments[0]["query"], "What does this do?");
        assert_eq!(comments[0]["current_file"], "auth.py");
        assert_eq!(comments[0]["current_line"], 12);
        assert!(comments[0]["current_context"]["auth.py"].is_array());
    }

    app.submit("github.com/acme/widgets", "Where are routes defined?")
        .await;
    assert!(app.thread("auth.py", 12).is_empty());
}

#[tokio::test]
async fn test_whitespace_question_never_reaches_backend() {
    let (config, rec) = widgets_backend().await;
    let app = AppState::new(config).unwrap();
    app.submit("github.com/acme/widgets", "auth").await;
    assert!(app.open_dialog("auth.py", 10));

    assert_eq!(app.submit_question(" \t ").await, QuestionOutcome::Rejected);
    assert!(rec.comments.lock().is_empty());
}

#[tokio::test]
async fn test_lines_outside_returned_snippets_cannot_be_annotated() {
    let (config, rec) = widgets_backend().await;
    let app = AppState::new(config).unwrap();
    app.submit("github.com/acme/widgets", "auth").await;

    assert!(!app.open_dialog("nope.py", 9999));
    assert!(!app.open_dialog("auth.py", 26));
    assert!(!app.open_dialog_at("ghost.rs", LineRange { start: 500, end: 600 }, 1));
    assert_eq!(app.submit_question("why?").await, QuestionOutcome::Rejected);
    assert!(!app.commit());
    assert!(app.thread("nope.py", 9999).is_empty());
    assert!(rec.comments.lock().is_empty());

    let routes = app.block_range("api/routes.py", 1).unwrap();
    assert_eq!(routes, LineRange { start: 1, end: 3 });
    assert!(!app.open_dialog_at("api/routes.py", routes, 4));
    assert!(app.open_dialog_at("api/routes.py", routes, 3));
}

#[tokio::test]
async fn test_server_error_becomes_generic_message() {
    let config = spawn_backend(Router::new().route("/api/search", post(server_error))).await;
    let app = AppState::new(config).unwrap();

    let state = app.submit("github.com/acme/widgets", "auth").await;
    assert_eq!(state, SessionState::Error(SEARCH_ERROR_MESSAGE.to_string()));
}

#[tokio::test]
async fn test_malformed_body_is_treated_as_failure() {
    for router in [
        Router::new().route("/api/search", post(wrong_shape)),
        Router::new().route("/api/search", post(not_json)),
    ] {
        let config = spawn_backend(router).await;
        let app = AppState::new(config).unwrap();
        let state = app.submit("github.com/acme/widgets", "auth").await;
        assert_eq!(state, SessionState::Error(SEARCH_ERROR_MESSAGE.to_string()));
    }
}

#[tokio::test]
async fn test_unreachable_backend_becomes_generic_message() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = AppState::new(Config {
        base_url: format!("http://{addr}"),
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
    })
    .unwrap();
    let state = app.submit("github.com/acme/widgets", "auth").await;
    assert_eq!(state, SessionState::Error(SEARCH_ERROR_MESSAGE.to_string()));
}

#[tokio::test]
async fn test_comment_failure_keeps_thread_empty() {
    let rec = Recorded::default();
    let router = Router::new()
        .route("/api/search", post(widgets_search))
        .route("/api/comment", post(server_error))
        .with_state(rec);
    let app = AppState::new(spawn_backend(router).await).unwrap();

    app.submit("github.com/acme/widgets", "auth").await;
    assert!(app.open_dialog("auth.py", 11));
    assert!(matches!(
        app.submit_question("Why?").await,
        QuestionOutcome::Failed(_)
    ));
    assert!(!app.commit());
    assert!(app.thread("auth.py", 11).is_empty());
}
