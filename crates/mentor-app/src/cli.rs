//! CLI argument definitions for the mentor server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use mentor_core::config::{expand_home, MentorConfig};
use mentor_core::error::MentorError;

/// Reading assistant server: explains texts and answers follow-up questions.
#[derive(Parser, Debug)]
#[command(name = "mentor", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", env = "MENTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", env = "MENTOR_PORT")]
    pub port: Option<u16>,

    /// SQLite database file.
    #[arg(short = 'd', long = "database", env = "MENTOR_DATABASE")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", env = "MENTOR_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Falls back to `~/.mentor/config.toml` when neither the flag nor the
    /// environment names one.
    pub fn resolve_config_path(&self) -> PathBuf {
        match self.config {
            Some(ref p) => p.clone(),
            None => expand_home("~/.mentor/config.toml"),
        }
    }

    /// Read the configuration file and apply env and CLI overrides.
    ///
    /// An unreadable or malformed file falls back to defaults. The error is
    /// kept so it can be reported once logging is up.
    pub fn load_config(&self) -> LoadedConfig {
        let path = self.resolve_config_path();
        let (mut config, error) = match MentorConfig::load(&path) {
            Ok(config) => (config, None),
            Err(e) => (MentorConfig::default(), Some(e)),
        };
        config.apply_env_overrides();
        self.apply_to(&mut config);
        LoadedConfig {
            config,
            path,
            error,
        }
    }

    /// Overlay the command-line values onto a loaded configuration.
    pub fn apply_to(&self, config: &mut MentorConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref db) = self.database {
            config.database.path = db.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Configuration as resolved at startup.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: MentorConfig,
    pub path: PathBuf,
    pub error: Option<MentorError>,
}

impl LoadedConfig {
    /// Log where the configuration came from.
    pub fn report(&self) {
        let path = self.path.display();
        match &self.error {
            None => tracing::info!(path = %path, "Configuration loaded"),
            Some(MentorError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "No configuration file; using defaults")
            }
            Some(e) => tracing::warn!(
                path = %path,
                error = %e,
                "Could not load configuration; using defaults"
            ),
        }
    }
}
