mod core;
mod gate;
mod history;
mod state;


pub use state::{
    ApprovalDecision, ApprovalRequest, ChatSession, PendingApproval, SessionState, SessionUpdate,
    StopHandle, ToolActivity, ToolPhase,
};
