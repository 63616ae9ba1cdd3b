//! Search lifecycle: `Idle -> Loading -> Ready | Error`, with a guard that
//! drops responses to superseded requests.

use anyhow::Result;

use crate::models::{SearchRequest, SearchResult};

/// Shown for every search failure. The underlying error goes to the log.
pub const SEARCH_ERROR_MESSAGE: &str = "An error occurred while searching. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Error(String),
    Ready(SearchResult),
}

impl SessionState {
    pub fn result(&self) -> Option<&SearchResult> {
        match self {
            SessionState::Ready(result) => Some(result),
            _ => None,
        }
    }
}

/// Handed out by [`SearchSession::begin`]; only the newest ticket may
/// complete.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    pub request: SearchRequest,
}

#[derive(Debug, Default)]
pub struct SearchSession {
    state: SessionState,
    generation: u64,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Start a search. Inputs are passed through as-is; the backend decides
    /// what is valid. Any earlier ticket becomes stale.
    pub fn begin(&mut self, repository_url: &str, question: &str) -> SearchTicket {
        self.generation += 1;
        self.state = SessionState::Loading;
        tracing::debug!(generation = self.generation, "search started");
        SearchTicket {
            generation: self.generation,
            request: SearchRequest {
                github_url: repository_url.to_string(),
                query: question.to_string(),
            },
        }
    }

    /// Apply a search outcome. Returns false and leaves state untouched if a
    /// newer search (or a reset) has happened since `ticket` was issued.
    pub fn complete(&mut self, ticket: &SearchTicket, outcome: Result<SearchResult>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                stale = ticket.generation,
                current = self.generation,
                "discarding stale search response"
            );
            return false;
        }

        self.state = match outcome {
            Ok(result) => {
                tracing::info!(
                    repo = %ticket.request.github_url,
                    files = result.files.len(),
                    "search completed"
                );
                SessionState::Ready(result)
            }
            Err(e) => {
                tracing::warn!(repo = %ticket.request.github_url, "search failed: {e:#}");
                SessionState::Error(SEARCH_ERROR_MESSAGE.to_string())
            }
        };
        true
    }

    /// Drop the current result and invalidate any in-flight search.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileSnippets, SearchResult};

    fn result_with(path: &str) -> SearchResult {
        SearchResult {
            files: vec![FileSnippets {
                path: path.to_string(),
                snippets: vec![],
            }],
        }
    }

    #[test]
    fn test_begin_moves_to_loading() {
        let mut session = SearchSession::new();
        assert_eq!(*session.state(), SessionState::Idle);

        let ticket = session.begin("github.com/acme/widgets", "Where is auth handled?");
        assert_eq!(*session.state(), SessionState::Loading);
        assert_eq!(ticket.request.github_url, "github.com/acme/widgets");
        assert_eq!(ticket.request.query, "Where is auth handled?");
    }

    #[test]
    fn test_empty_inputs_are_not_validated_here() {
        let mut session = SearchSession::new();
        let ticket = session.begin("", "");
        assert_eq!(*session.state(), SessionState::Loading);
        assert_eq!(ticket.request.query, "");
    }

    #[test]
    fn test_success_moves_to_ready() {
        let mut session = SearchSession::new();
        let ticket = session.begin("u", "q");
        assert!(session.complete(&ticket, Ok(result_with("a.py"))));
        assert_eq!(session.state().result(), Some(&result_with("a.py")));
    }

    #[test]
    fn test_failure_uses_generic_message() {
        let mut session = SearchSession::new();
        let ticket = session.begin("u", "q");
        let applied = session.complete(
            &ticket,
            Err(anyhow::anyhow!("http://x/api/search returned 500: traceback...")),
        );
        assert!(applied);
        assert_eq!(
            *session.state(),
            SessionState::Error(SEARCH_ERROR_MESSAGE.to_string())
        );
    }

    #[test]
    fn test_older_response_arriving_last_is_discarded() {
        let mut session = SearchSession::new();
        let first = session.begin("u", "first");
        let second = session.begin("u", "second");

        assert!(session.complete(&second, Ok(result_with("second.py"))));
        assert!(!session.complete(&first, Ok(result_with("first.py"))));
        assert_eq!(session.state().result(), Some(&result_with("second.py")));
    }

    #[test]
    fn test_older_failure_does_not_clobber_loading() {
        let mut session = SearchSession::new();
        let first = session.begin("u", "first");
        let _second = session.begin("u", "second");

        assert!(!session.complete(&first, Err(anyhow::anyhow!("timed out"))));
        assert_eq!(*session.state(), SessionState::Loading);
    }

    #[test]
    fn test_reset_invalidates_in_flight_search() {
        let mut session = SearchSession::new();
        let ticket = session.begin("u", "q");
        session.reset();

        assert!(!session.complete(&ticket, Ok(result_with("a.py"))));
        assert_eq!(*session.state(), SessionState::Idle);
    }

    #[test]
    fn test_retry_after_error() {
        let mut session = SearchSession::new();
        let ticket = session.begin("u", "q");
        session.complete(&ticket, Err(anyhow::anyhow!("connection refused")));

        let retry = session.begin("u", "q");
        assert!(session.complete(&retry, Ok(result_with("a.py"))));
        assert!(session.state().result().is_some());
    }
}
