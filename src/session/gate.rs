use super::core::{emit_update, TurnEnd};
use super::history::{join_sections, render_execution_summary, REJECTION_NOTICE};
use super::state::{ApprovalDecision, ApprovalRequest, ChatSession, SessionUpdate, StopHandle};
use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

impl ChatSession {
    /// Suspend the turn until the pending approval is resolved.
    ///
    /// Each round surfaces an `ApprovalRequest` through the update channel
    /// and awaits its one-shot responder. An execution failure stays scoped
    /// to the approval (`last_error` on the pending record, fresh request
    /// issued) so the user can retry with an edited query or reject; only
    /// approve-success, reject, or stop leave the gate.
    pub(super) async fn run_approval_gate(
        &mut self,
        stop: &StopHandle,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<TurnEnd> {
        loop {
            let response_rx = {
                let Some(pending) = self.pending_approval.as_ref() else {
                    return Ok(TurnEnd::Resolved);
                };
                let (response_tx, response_rx) = oneshot::channel();
                emit_update(
                    update_tx,
                    SessionUpdate::ApprovalRequest(ApprovalRequest::new(pending, response_tx)),
                );
                response_rx
            };

            let decision = tokio::select! {
                biased;
                _ = stop.stopped() => return Ok(TurnEnd::Cancelled),
                decision = response_rx => decision,
            };

            match decision {
                Ok(ApprovalDecision::Approve { query }) => {
                    match self.client.execute_query(self.data_source_id, &query).await {
                        Ok(execution) if execution.error.is_none() => {
                            let summary = render_execution_summary(&execution);
                            self.resolve_approval(&summary, update_tx);
                            return Ok(TurnEnd::Resolved);
                        }
                        Ok(execution) => {
                            let message = execution
                                .error
                                .unwrap_or_else(|| "query execution failed".to_string());
                            self.record_approval_failure(message);
                        }
                        Err(error) => self.record_approval_failure(error.to_string()),
                    }
                }
                // A dropped responder (no observer, or the surface went away)
                // counts as a rejection: privileged work defaults to "no".
                Ok(ApprovalDecision::Reject) | Err(_) => {
                    self.resolve_approval(REJECTION_NOTICE, update_tx);
                    return Ok(TurnEnd::Resolved);
                }
            }
        }
    }

    fn resolve_approval(
        &mut self,
        closing: &str,
        update_tx: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        let Some(pending) = self.pending_approval.take() else {
            return;
        };
        let content = join_sections(&pending.accumulated_content, closing);
        self.commit_assistant(content, None);

        if let Some(activity) = self.tool_activity.as_ref() {
            let tool = activity.tool.clone();
            self.set_tool_phase(&tool, super::state::ToolPhase::Done, update_tx);
        }
    }

    fn record_approval_failure(&mut self, message: String) {
        if let Some(pending) = self.pending_approval.as_mut() {
            pending.last_error = Some(message);
        }
    }
}
