use std::sync::Arc;

use parking_lot::Mutex;

use crate::annotations::{AnnotationStore, Dialog};
use crate::client::{Backend, HttpBackend};
use crate::config::Config;
use crate::models::{CommentRequest, LineRange, QaPair};
use crate::session::{SearchSession, SessionState};

/// What became of a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// Blank text, no dialog open, or a question already in flight. Nothing
    /// was sent.
    Rejected,
    /// The answer is shown in the dialog, waiting for `commit`.
    Answered(String),
    /// The backend call failed; the dialog shows this message.
    Failed(String),
    /// The dialog was closed or reset while the request was in flight.
    Discarded,
}

struct Inner {
    session: SearchSession,
    annotations: AnnotationStore,
}

/// State for one browsing session: the current search and the annotations
/// on its result. The lock is never held across a backend call.
pub struct AppState<B: Backend = HttpBackend> {
    pub config: Config,
    backend: Arc<B>,
    inner: Arc<Mutex<Inner>>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            backend: Arc::clone(&self.backend),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl AppState<HttpBackend> {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::with_backend(config, backend))
    }
}

impl<B: Backend> AppState<B> {
    pub fn with_backend(config: Config, backend: B) -> Self {
        Self {
            config,
            backend: Arc::new(backend),
            inner: Arc::new(Mutex::new(Inner {
                session: SearchSession::new(),
                annotations: AnnotationStore::new(),
            })),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().session.state().clone()
    }

    /// Run a search and return the state afterwards. Starting it discards the
    /// previous result and all of its annotations. If another search starts
    /// before this one answers, this one's response is dropped.
    pub async fn submit(&self, repository_url: &str, question: &str) -> SessionState {
        let ticket = {
            let mut inner = self.inner.lock();
            inner.annotations.reset();
            inner.session.begin(repository_url, question)
        };

        let outcome = self.backend.search(&ticket.request).await;

        let mut inner = self.inner.lock();
        inner.session.complete(&ticket, outcome);
        inner.session.state().clone()
    }

    /// Back to `Idle` with no result and no annotations.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.session.reset();
        inner.annotations.reset();
    }

    /// Open the dialog on `(file, line)`. The line has to fall inside one of
    /// the snippets the current result returned for `file`.
    pub fn open_dialog(&self, file: &str, line: u32) -> bool {
        let mut inner = self.inner.lock();
        let covered = inner
            .session
            .state()
            .result()
            .is_some_and(|result| result.covers_line(file, line));
        if !covered {
            tracing::debug!(file, line, "line is not part of the current result");
            return false;
        }
        inner.annotations.open_dialog(file, line)
    }

    /// Open the dialog from a click on `visual_row` of the snippet spanning
    /// `range` in `file`. `range` has to be one the current result returned
    /// for `file`.
    pub fn open_dialog_at(&self, file: &str, range: LineRange, visual_row: u32) -> bool {
        let mut inner = self.inner.lock();
        let known = inner
            .session
            .state()
            .result()
            .is_some_and(|result| result.has_range(file, range));
        if !known {
            tracing::debug!(file, ?range, "range is not part of the current result");
            return false;
        }
        inner.annotations.open_dialog_at(file, range, visual_row)
    }

    pub fn dialog(&self) -> Option<Dialog> {
        self.inner.lock().annotations.dialog().cloned()
    }

    /// Ask the backend about the dialog's line. Blank text never leaves the
    /// process.
    pub async fn submit_question(&self, text: &str) -> QuestionOutcome {
        let (ticket, request) = {
            let mut inner = self.inner.lock();
            let Some(ticket) = inner.annotations.begin_question(text) else {
                return QuestionOutcome::Rejected;
            };
            let request = CommentRequest {
                query: ticket.question.clone(),
                current_context: inner.session.state().result().cloned(),
                current_file: Some(ticket.target.file.clone()),
                current_line: Some(ticket.target.line),
            };
            (ticket, request)
        };

        let outcome = self.backend.comment(&request).await;
        let answer = outcome.as_ref().ok().cloned();

        let mut inner = self.inner.lock();
        if !inner.annotations.finish_question(&ticket, outcome) {
            return QuestionOutcome::Discarded;
        }
        match answer {
            Some(answer) => QuestionOutcome::Answered(answer),
            None => QuestionOutcome::Failed(crate::annotations::COMMENT_ERROR_MESSAGE.to_string()),
        }
    }

    pub fn commit(&self) -> bool {
        self.inner.lock().annotations.commit()
    }

    pub fn close_dialog(&self) {
        self.inner.lock().annotations.close_dialog();
    }

    pub fn thread(&self, file: &str, line: u32) -> Vec<QaPair> {
        self.inner.lock().annotations.thread(file, line).to_vec()
    }

    /// Render the current result, if any, with its annotations.
    pub fn render_text(&self) -> Option<String> {
        let inner = self.inner.lock();
        let result = inner.session.state().result()?;
        let files = crate::render::render(result, &inner.annotations);
        Some(crate::render::format_result(&files))
    }

    /// Range of block `block` (1-based, as numbered by `render_text`) in
    /// `file` of the current result.
    pub fn block_range(&self, file: &str, block: usize) -> Option<LineRange> {
        let inner = self.inner.lock();
        let result = inner.session.state().result()?;
        let range = result.ranges(file).nth(block.checked_sub(1)?);
        range
    }
}
