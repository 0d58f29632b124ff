use super::state::ChatSession;
use crate::types::{Message, QueryExecution, Usage};

/// Appended to committed partial text when the user stops generation.
pub(super) const STOPPED_MARKER: &str = "\n\n*[Generation stopped by user]*";

pub(super) const REJECTION_NOTICE: &str =
    "**Query execution rejected.** The proposed query was not run.";

impl ChatSession {
    pub(super) fn commit_assistant(&mut self, content: String, usage: Option<Usage>) {
        self.messages.push(Message::assistant(content, usage));
    }

    pub(super) fn commit_error(&mut self, message: String) {
        self.messages.push(Message::error(message));
    }
}

/// Closing note for an approved execution: row count when the result is
/// tabular, a generic success note otherwise.
pub(super) fn render_execution_summary(execution: &QueryExecution) -> String {
    let result_set = execution.data.as_ref();
    match result_set.and_then(|data| data.rows.as_ref()) {
        Some(rows) => {
            let count = rows.len();
            let noun = if count == 1 { "row" } else { "rows" };
            if result_set.is_some_and(|data| data.truncated) {
                format!("**Query Approved and Executed.** Returned {count} {noun} (truncated).")
            } else {
                format!("**Query Approved and Executed.** Returned {count} {noun}.")
            }
        }
        None => "**Query Approved and Executed.** The query completed successfully.".to_string(),
    }
}

pub(super) fn join_sections(head: &str, tail: &str) -> String {
    if head.is_empty() {
        tail.to_string()
    } else {
        format!("{head}\n\n{tail}")
    }
}
