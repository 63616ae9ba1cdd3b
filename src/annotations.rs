//! Per-line question/answer threads and the single dialog that adds to them.

use std::collections::HashMap;

use anyhow::Result;

use crate::models::{LineRange, QaPair};

/// Shown in the dialog when the backend could not answer.
pub const COMMENT_ERROR_MESSAGE: &str = "Failed to get a response. Please try again.";

/// Map a click on 1-based `visual_row` of a snippet starting at `start` to an
/// absolute line. Row 0 does not exist.
pub fn resolve_line(start: u32, visual_row: u32) -> Option<u32> {
    if visual_row == 0 {
        return None;
    }
    start.checked_add(visual_row - 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub file: String,
    pub line: u32,
}

impl LineKey {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogPhase {
    /// Waiting for the user to type a question
    Editing,
    /// Question sent, no reply yet
    Pending { request_id: u64, question: String },
    /// Reply received, not yet committed
    Answered { question: String, answer: String },
    /// Last attempt failed; the user may retry
    Failed { question: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub target: LineKey,
    pub phase: DialogPhase,
}

/// Issued when a question is accepted for sending.
#[derive(Debug, Clone)]
pub struct QuestionTicket {
    request_id: u64,
    pub target: LineKey,
    pub question: String,
}

#[derive(Debug, Default)]
pub struct AnnotationStore {
    threads: HashMap<LineKey, Vec<QaPair>>,
    dialog: Option<Dialog>,
    next_request_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn thread(&self, file: &str, line: u32) -> &[QaPair] {
        self.threads
            .get(&LineKey::new(file, line))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Open the dialog on `(file, line)`. Refused while a dialog for another
    /// line is open; the caller has to close that one first.
    pub fn open_dialog(&mut self, file: &str, line: u32) -> bool {
        let target = LineKey::new(file, line);
        if let Some(open) = &self.dialog {
            if open.target != target {
                tracing::debug!(
                    open_file = %open.target.file,
                    open_line = open.target.line,
                    "dialog already open, ignoring open request"
                );
            }
            return open.target == target;
        }

        self.dialog = Some(Dialog {
            target,
            phase: DialogPhase::Editing,
        });
        true
    }

    /// Open the dialog from a click on `visual_row` of the snippet spanning
    /// `range`. Rows outside the range are refused.
    pub fn open_dialog_at(&mut self, file: &str, range: LineRange, visual_row: u32) -> bool {
        match resolve_line(range.start, visual_row) {
            Some(line) if range.contains(line) => self.open_dialog(file, line),
            _ => false,
        }
    }

    /// Accept a question for sending. Refused for blank text, with no dialog
    /// open, or while an earlier question is still pending or answered but
    /// uncommitted.
    pub fn begin_question(&mut self, text: &str) -> Option<QuestionTicket> {
        let question = text.trim();
        if question.is_empty() {
            return None;
        }
        let dialog = self.dialog.as_mut()?;
        if !matches!(
            dialog.phase,
            DialogPhase::Editing | DialogPhase::Failed { .. }
        ) {
            return None;
        }

        self.next_request_id += 1;
        dialog.phase = DialogPhase::Pending {
            request_id: self.next_request_id,
            question: question.to_string(),
        };
        Some(QuestionTicket {
            request_id: self.next_request_id,
            target: dialog.target.clone(),
            question: question.to_string(),
        })
    }

    /// Apply the backend's reply. Returns false when the dialog that asked
    /// has since been closed or replaced.
    pub fn finish_question(&mut self, ticket: &QuestionTicket, outcome: Result<String>) -> bool {
        let Some(dialog) = self.dialog.as_mut() else {
            tracing::debug!("dialog closed before answer arrived, dropping it");
            return false;
        };
        match &dialog.phase {
            DialogPhase::Pending { request_id, .. } if *request_id == ticket.request_id => {}
            _ => {
                tracing::debug!(request_id = ticket.request_id, "dropping answer for stale question");
                return false;
            }
        }

        dialog.phase = match outcome {
            Ok(answer) => DialogPhase::Answered {
                question: ticket.question.clone(),
                answer,
            },
            Err(e) => {
                tracing::warn!(
                    file = %ticket.target.file,
                    line = ticket.target.line,
                    "comment request failed: {e:#}"
                );
                DialogPhase::Failed {
                    question: ticket.question.clone(),
                    message: COMMENT_ERROR_MESSAGE.to_string(),
                }
            }
        };
        true
    }

    /// Append the answered pair to its line's thread and close the dialog.
    /// Does nothing until an answer has arrived.
    pub fn commit(&mut self) -> bool {
        if !matches!(
            self.dialog,
            Some(Dialog {
                phase: DialogPhase::Answered { .. },
                ..
            })
        ) {
            return false;
        }
        let Some(Dialog {
            target,
            phase: DialogPhase::Answered { question, answer },
        }) = self.dialog.take()
        else {
            return false;
        };

        self.threads
            .entry(target)
            .or_default()
            .push(QaPair { question, answer });
        true
    }

    /// Close the dialog, discarding anything uncommitted.
    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    /// Forget all threads and any open dialog.
    pub fn reset(&mut self) {
        self.threads.clear();
        self.dialog = None;
    }
}
