pub mod api;
pub mod config;
pub mod session;
#[cfg(test)]
pub mod test_support;
pub mod types;
pub mod util;

pub use session::{ApprovalRequest, ChatSession, SessionState, SessionUpdate, StopHandle};
