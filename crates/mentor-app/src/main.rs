//! Mentor server binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Open the SQLite pool and run migrations
//! 3. Load prompt templates and build the chat model
//! 4. Start the task runner workers
//! 5. Serve the REST API until ctrl-c, then drain the task queue

mod cli;

use std::sync::Arc;

use clap::Parser;

use mentor_api::AppState;
use mentor_assistant::{build_provider, Assistant, PromptCatalog};
use mentor_core::config::expand_home;
use mentor_storage::{
    Database, OwnerRepository, SessionRepository, SqliteHistoryStore, TaskRepository,
};
use mentor_tasks::{TaskLedger, TaskRunner};

use cli::CliArgs;

/// Resolves once the process receives ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. The file is read before logging exists; its outcome is
    // reported right after the subscriber is installed.
    let loaded = args.load_config();

    // Tracing. RUST_LOG wins over the configured level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(&loaded.config.general.log_level)
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting mentor v{}", env!("CARGO_PKG_VERSION"));
    loaded.report();
    let config = loaded.config;
    config.validate()?;

    // Storage.
    let db = Database::open(&config.database)?;

    // Prompts and model. Every template must be present before serving.
    let catalog = Arc::new(PromptCatalog::from_dir(expand_home(&config.prompts.dir)));
    catalog.preload()?;
    let model = build_provider(&config.provider)?;

    let history = Arc::new(SqliteHistoryStore::new(db.clone()));
    let assistant = Arc::new(Assistant::new(catalog, model, history));

    // Tasks left unfinished by a previous run can never complete.
    let ledger = TaskLedger::new(TaskRepository::new(db.clone()));
    ledger.fail_interrupted()?;

    let owners = OwnerRepository::new(db.clone());
    let sessions = SessionRepository::new(db);
    let runner = Arc::new(TaskRunner::start(
        &config.worker,
        assistant,
        owners.clone(),
        sessions.clone(),
        ledger,
    ));

    // === API server ===

    let state = AppState::new(config.clone(), owners, sessions, Arc::clone(&runner));
    let served = mentor_api::start_server(&config, state, shutdown_signal()).await;

    runner.shutdown().await;
    tracing::info!("Task queue drained");

    served?;
    Ok(())
}
