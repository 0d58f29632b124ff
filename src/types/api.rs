use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Local-only marker for surfaced turn failures; never sent to the backend.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            usage: None,
        }
    }

    pub fn assistant(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            usage,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One decoded frame from the chat event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolStart { tool: String, id: String },
    ToolResult { tool: String, result: serde_json::Value },
    Done { usage: Usage },
    Error { message: String },
}

/// Approval fields a `tool_result` payload may carry for the privileged tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalPayload {
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub query: String,
    pub purpose: Option<String>,
}

impl ApprovalPayload {
    pub fn from_result(result: &serde_json::Value) -> Option<Self> {
        let payload: Self = serde_json::from_value(result.clone()).ok()?;
        payload.requires_approval.then_some(payload)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantStatus {
    pub enabled: bool,
    pub configured: bool,
}

/// Response of the synchronous execute-query endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryExecution {
    #[serde(default)]
    pub data: Option<ResultSet>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub rows: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub truncated: bool,
}
