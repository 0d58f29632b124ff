use super::state::{
    ChatSession, PendingApproval, SessionState, SessionUpdate, StopHandle, ToolActivity, ToolPhase,
};
use crate::api::logging::emit_orphan_tool_result;
use crate::api::stream::StreamParser;
use crate::types::{ApprovalPayload, StreamEvent, Usage};
use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;

/// The only backend tool whose result can demand human approval.
pub(super) const PRIVILEGED_TOOL: &str = "execute_query";

/// Shown when the backend omits a purpose for the gated query.
const DEFAULT_APPROVAL_PURPOSE: &str = "Verify query results";

/// How a turn reached its end.
pub(super) enum TurnEnd {
    Completed { usage: Usage },
    /// The approval gate already committed the closing assistant message.
    Resolved,
    Cancelled,
    Failed { message: String },
}

impl ChatSession {
    /// Run one full turn: append the user message, open the stream, dispatch
    /// events in arrival order, and settle the session into a terminal state.
    ///
    /// No-ops while a turn is already in flight. Transport and backend
    /// failures are absorbed into the session state (history + `last_error`)
    /// rather than returned; `Err` is reserved for none of the current paths
    /// and kept for interface stability.
    pub async fn send(
        &mut self,
        content: String,
        stop: &StopHandle,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<()> {
        if !self.state.accepts_send() {
            return Ok(());
        }

        self.state = SessionState::Streaming;
        self.last_error = None;
        self.buffer.clear();
        self.tool_activity = None;
        self.pending_approval = None;
        self.push_user_message(content);

        let end = match self.run_turn(stop, update_tx).await {
            Ok(end) => end,
            // An abort-induced transport failure is a cancellation, never a
            // turn error.
            Err(_) if stop.is_stopped() => TurnEnd::Cancelled,
            Err(error) => TurnEnd::Failed {
                message: error.to_string(),
            },
        };
        self.finish_turn(end, update_tx);
        Ok(())
    }

    async fn run_turn(
        &mut self,
        stop: &StopHandle,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<TurnEnd> {
        let messages = self.messages_for_api();
        let mut stream = self
            .client
            .create_chat_stream(self.data_source_id, &messages)
            .await?;
        let mut parser = StreamParser::new();
        let mut privileged_tool_id: Option<String> = None;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(TurnEnd::Cancelled),
                next = stream.next() => match next {
                    Some(chunk) => chunk?,
                    None => break,
                },
            };

            for event in parser.process(&chunk) {
                // stop() may land while a decoded batch is still being
                // drained; events behind the stop point must never reach a
                // handler.
                if stop.is_stopped() {
                    return Ok(TurnEnd::Cancelled);
                }
                if let Some(end) = self
                    .handle_event(event, &mut privileged_tool_id, stop, update_tx)
                    .await?
                {
                    return Ok(end);
                }
            }
        }

        // EOF without a terminal frame counts as a mid-stream failure.
        Ok(TurnEnd::Failed {
            message: "response stream ended before completion".to_string(),
        })
    }

    async fn handle_event(
        &mut self,
        event: StreamEvent,
        privileged_tool_id: &mut Option<String>,
        stop: &StopHandle,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<Option<TurnEnd>> {
        match event {
            StreamEvent::TextDelta { text } => {
                self.buffer.push_str(&text);
                emit_update(update_tx, SessionUpdate::TextDelta(text));
            }
            StreamEvent::ToolStart { tool, id } => {
                if tool == PRIVILEGED_TOOL {
                    *privileged_tool_id = Some(id.clone());
                }
                let activity = ToolActivity {
                    tool,
                    id: Some(id),
                    phase: ToolPhase::Running,
                };
                self.tool_activity = Some(activity.clone());
                emit_update(update_tx, SessionUpdate::ToolStatus(activity));
            }
            StreamEvent::ToolResult { tool, result } => {
                if let Some(payload) = ApprovalPayload::from_result(&result) {
                    let tool_call_id = match privileged_tool_id.take() {
                        Some(id) => id,
                        None => {
                            // A result with no matching start is still
                            // processed; the missing correlation is only
                            // worth a log line.
                            emit_orphan_tool_result(&tool);
                            String::new()
                        }
                    };
                    self.pending_approval = Some(PendingApproval {
                        query: payload.query,
                        purpose: payload
                            .purpose
                            .unwrap_or_else(|| DEFAULT_APPROVAL_PURPOSE.to_string()),
                        tool_call_id,
                        accumulated_content: self.buffer.clone(),
                        last_error: None,
                    });
                    self.state = SessionState::WaitingApproval;
                    self.set_tool_phase(&tool, ToolPhase::WaitingApproval, update_tx);
                    return Ok(Some(self.run_approval_gate(stop, update_tx).await?));
                }

                if self.tool_activity.is_none() {
                    emit_orphan_tool_result(&tool);
                }
                self.set_tool_phase(&tool, ToolPhase::Done, update_tx);
            }
            StreamEvent::Done { usage } => return Ok(Some(TurnEnd::Completed { usage })),
            StreamEvent::Error { message } => return Ok(Some(TurnEnd::Failed { message })),
        }
        Ok(None)
    }

    fn finish_turn(
        &mut self,
        end: TurnEnd,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        match end {
            TurnEnd::Completed { usage } => {
                let content = std::mem::take(&mut self.buffer);
                if !content.is_empty() {
                    self.commit_assistant(content, Some(usage));
                }
                self.tool_activity = None;
                self.state = SessionState::Done;
                emit_update(update_tx, SessionUpdate::TurnComplete);
            }
            TurnEnd::Resolved => {
                self.buffer.clear();
                self.tool_activity = None;
                self.state = SessionState::Done;
                emit_update(update_tx, SessionUpdate::TurnComplete);
            }
            TurnEnd::Cancelled => {
                let content = std::mem::take(&mut self.buffer);
                if !content.is_empty() {
                    self.commit_assistant(
                        format!("{content}{}", super::history::STOPPED_MARKER),
                        None,
                    );
                }
                self.pending_approval = None;
                self.tool_activity = None;
                self.state = SessionState::Idle;
                emit_update(update_tx, SessionUpdate::TurnComplete);
            }
            TurnEnd::Failed { message } => {
                let content = std::mem::take(&mut self.buffer);
                if !content.is_empty() {
                    // Partial output keeps its audit value even on failure.
                    self.commit_assistant(content, None);
                }
                self.commit_error(message.clone());
                self.last_error = Some(message.clone());
                self.pending_approval = None;
                self.tool_activity = None;
                self.state = SessionState::Error;
                emit_update(update_tx, SessionUpdate::TurnError(message));
            }
        }
    }

    pub(super) fn set_tool_phase(
        &mut self,
        tool: &str,
        phase: ToolPhase,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        let id = self
            .tool_activity
            .as_ref()
            .and_then(|activity| activity.id.clone());
        let activity = ToolActivity {
            tool: tool.to_string(),
            id,
            phase,
        };
        self.tool_activity = Some(activity.clone());
        emit_update(update_tx, SessionUpdate::ToolStatus(activity));
    }
}

pub(super) fn emit_update(
    update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    update: SessionUpdate,
) {
    if let Some(tx) = update_tx {
        let _ = tx.send(update);
    }
}
