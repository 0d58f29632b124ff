mod api;

pub use api::{
    ApprovalPayload, AssistantStatus, Message, QueryExecution, ResultSet, Role, StreamEvent, Usage,
};
