use crate::api::ApiClient;
use crate::types::{AssistantStatus, Message, Role};
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    WaitingApproval,
    Done,
    Error,
}

impl SessionState {
    /// A new `send` is permitted from any state that is not mid-turn.
    pub fn accepts_send(self) -> bool {
        !matches!(self, SessionState::Streaming | SessionState::WaitingApproval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Running,
    Done,
    WaitingApproval,
}

/// Transient status of the current tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolActivity {
    pub tool: String,
    pub id: Option<String>,
    pub phase: ToolPhase,
}

/// The one open approval for the active turn. `accumulated_content` is the
/// assistant text produced before the tool call, frozen when the gate opens.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub query: String,
    pub purpose: String,
    pub tool_call_id: String,
    pub accumulated_content: String,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub enum ApprovalDecision {
    /// The query may have been edited by the user; it is passed through
    /// verbatim — validation is the executing backend's responsibility.
    Approve { query: String },
    Reject,
}

/// One-shot approval prompt surfaced through the update channel. Approve and
/// reject consume the request, so a given approval resolves exactly once.
pub struct ApprovalRequest {
    pub query: String,
    pub purpose: String,
    pub tool_call_id: String,
    pub last_error: Option<String>,
    response_tx: oneshot::Sender<ApprovalDecision>,
}

impl ApprovalRequest {
    pub(super) fn new(
        pending: &PendingApproval,
        response_tx: oneshot::Sender<ApprovalDecision>,
    ) -> Self {
        Self {
            query: pending.query.clone(),
            purpose: pending.purpose.clone(),
            tool_call_id: pending.tool_call_id.clone(),
            last_error: pending.last_error.clone(),
            response_tx,
        }
    }

    pub fn approve(self, query: String) {
        let _ = self.response_tx.send(ApprovalDecision::Approve { query });
    }

    pub fn reject(self) {
        let _ = self.response_tx.send(ApprovalDecision::Reject);
    }
}

pub enum SessionUpdate {
    TextDelta(String),
    ToolStatus(ToolActivity),
    ApprovalRequest(ApprovalRequest),
    TurnComplete,
    TurnError(String),
}

/// Cooperative stop control for one turn. Clone the handle out to whatever
/// surface exposes the stop action; `stop` is idempotent and has no effect
/// once the turn has reached a terminal state.
#[derive(Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(super) async fn stopped(&self) {
        self.token.cancelled().await;
    }
}

/// One conversation with the assistant backend for one data source.
///
/// All mutation happens on the sequential event-processing path inside
/// `send`; a second turn cannot start while one is in flight, so no locking
/// is needed.
pub struct ChatSession {
    pub(super) client: Arc<ApiClient>,
    pub(super) data_source_id: u64,
    pub(super) messages: Vec<Message>,
    pub(super) state: SessionState,
    pub(super) buffer: String,
    pub(super) tool_activity: Option<ToolActivity>,
    pub(super) pending_approval: Option<PendingApproval>,
    pub(super) last_error: Option<String>,
}

impl ChatSession {
    pub fn new(client: ApiClient, data_source_id: u64) -> Self {
        Self {
            client: Arc::new(client),
            data_source_id,
            messages: Vec::new(),
            state: SessionState::Idle,
            buffer: String::new(),
            tool_activity: None,
            pending_approval: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Uncommitted assistant text for the in-flight turn.
    pub fn streaming_buffer(&self) -> &str {
        &self.buffer
    }

    pub fn tool_activity(&self) -> Option<&ToolActivity> {
        self.tool_activity.as_ref()
    }

    pub fn pending_approval(&self) -> Option<&PendingApproval> {
        self.pending_approval.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Probe the backend before allowing interaction; callers are expected to
    /// block input while this fails.
    pub async fn ensure_available(&self) -> Result<AssistantStatus> {
        let status = self.client.status().await?;
        if !status.enabled {
            bail!("AI assistant is not enabled for this organization");
        }
        if !status.configured {
            bail!("AI assistant is not configured; an API key must be set up");
        }
        Ok(status)
    }

    pub(super) fn push_user_message(&mut self, content: String) {
        self.messages.push(Message::user(content));
    }

    /// Error-role messages are local annotations; the backend only accepts
    /// user and assistant roles.
    pub(super) fn messages_for_api(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| message.role != Role::Error)
            .cloned()
            .collect()
    }
}
