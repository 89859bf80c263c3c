//! Mentor tasks crate - asynchronous execution of orchestrator operations.
//!
//! Provides the task state machine, the durable task ledger and the
//! [`TaskRunner`] worker pool that dispatches analyses and follow-up
//! questions and projects their status for polling callers.

pub mod error;
pub mod ledger;
pub mod runner;
pub mod state_machine;
pub mod types;

pub use error::TaskError;
pub use ledger::TaskLedger;
pub use runner::TaskRunner;
pub use state_machine::validate_transition;
pub use types::{DispatchReceipt, TaskKind, TaskOutcome, TaskRecord, TaskStatus, TaskStatusView};
