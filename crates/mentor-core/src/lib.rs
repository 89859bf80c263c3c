pub mod config;
pub mod error;
pub mod history;
pub mod types;

pub use config::MentorConfig;
pub use error::{MentorError, Result};
pub use history::{InMemoryHistoryStore, SessionHistoryStore};
pub use types::*;
