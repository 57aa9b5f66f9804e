//! Intent Layer
//!
//! Payment-bearing requests between agents:
//! - Intent records and the status state machine
//! - Coordinator for create, accept, process and fail
//! - Permission-gated agent actions
//! - Background poller

pub mod action;
pub mod coordinator;
pub mod poller;
pub mod record;

pub use action::{ActionExecutor, ActionReceipt, AgentAction, ACTION_KINDS};
pub use coordinator::IntentCoordinator;
pub use poller::{IntentPoller, ScanReport};
pub use record::{Intent, IntentStatus};
