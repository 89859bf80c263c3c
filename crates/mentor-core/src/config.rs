use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MentorError, Result};

/// Environment variable overriding `provider.api_key`.
pub const API_KEY_ENV: &str = "MENTOR_API_KEY";

/// Top-level configuration for the Mentor service.
///
/// Loaded from `~/.mentor/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl MentorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MentorConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.provider.api_key = Some(key);
            }
        }
    }

    /// Reject values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(MentorError::Config(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(MentorError::Config(
                "worker.concurrency must be at least 1".to_string(),
            ));
        }
        if self.worker.queue_capacity == 0 {
            return Err(MentorError::Config(
                "worker.queue_capacity must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(MentorError::Config(format!(
                "provider.temperature must be within [0, 2], got {}",
                self.provider.temperature
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path. A leading `~/` expands to the home directory.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.mentor/mentor.db".to_string(),
            pool_size: 10,
            busy_timeout_ms: 5000,
        }
    }
}

/// Hosted chat-completion platforms a deployment can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiPlatform {
    #[serde(rename = "together.ai")]
    TogetherAi,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "aws_bedrock")]
    AwsBedrock,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
}

impl fmt::Display for AiPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiPlatform::TogetherAi => write!(f, "together.ai"),
            AiPlatform::OpenAi => write!(f, "openai"),
            AiPlatform::AwsBedrock => write!(f, "aws_bedrock"),
            AiPlatform::AzureOpenAi => write!(f, "azure_openai"),
        }
    }
}

impl std::str::FromStr for AiPlatform {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "together.ai" => Ok(AiPlatform::TogetherAi),
            "openai" => Ok(AiPlatform::OpenAi),
            "aws_bedrock" => Ok(AiPlatform::AwsBedrock),
            "azure_openai" => Ok(AiPlatform::AzureOpenAi),
            _ => Err(format!("Unsupported AI platform: {}", s)),
        }
    }
}

/// Chat-completion provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub platform: AiPlatform,
    pub model: String,
    pub temperature: f64,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Transport timeout for one completion call.
    pub timeout_secs: u64,
    /// Azure OpenAI deployment name.
    pub deployment_name: Option<String>,
    /// AWS Bedrock region.
    pub region: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            platform: AiPlatform::TogetherAi,
            model: "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free".to_string(),
            temperature: 0.0,
            api_key: None,
            base_url: "https://api.together.xyz".to_string(),
            timeout_secs: 120,
            deployment_name: None,
            region: "us-east-1".to_string(),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("platform", &self.platform)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("deployment_name", &self.deployment_name)
            .field("region", &self.region)
            .finish()
    }
}

/// Prompt template location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory holding `{purpose}_{role}.txt` files.
    pub dir: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: "prompts".to_string(),
        }
    }
}

/// Background worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Jobs that may wait in the queue before dispatch is refused.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 256,
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").ok();
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").ok();
        if let Some(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
