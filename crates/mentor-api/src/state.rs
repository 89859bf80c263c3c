//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use mentor_core::config::MentorConfig;
use mentor_storage::{OwnerRepository, SessionRepository};
use mentor_tasks::TaskRunner;

/// Shared application state. Cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MentorConfig>,
    /// Registered users and their bearer tokens.
    pub owners: OwnerRepository,
    pub sessions: SessionRepository,
    /// Dispatches analyses and follow-ups; answers status polls.
    pub runner: Arc<TaskRunner>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: MentorConfig,
        owners: OwnerRepository,
        sessions: SessionRepository,
        runner: Arc<TaskRunner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            owners,
            sessions,
            runner,
            start_time: Instant::now(),
        }
    }
}
