//! Prompt catalog.
//!
//! Templates live on disk as `{purpose}_{role}.txt`. Each file is read once
//! and cached for the lifetime of the catalog; there is no invalidation.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::{AssistantError, Result};

/// Conversation purpose. Selects the templates and invocation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    TextAnalysis,
    FollowUp,
    TitleGeneration,
}

impl Purpose {
    pub const ALL: [Purpose; 3] = [
        Purpose::TextAnalysis,
        Purpose::FollowUp,
        Purpose::TitleGeneration,
    ];

    /// File name stem of this purpose's templates.
    pub fn stem(self) -> &'static str {
        match self {
            Purpose::TextAnalysis => "text_analysis",
            Purpose::FollowUp => "follow_up",
            Purpose::TitleGeneration => "generate_title",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    System,
    Human,
}

impl fmt::Display for PromptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptRole::System => write!(f, "system"),
            PromptRole::Human => write!(f, "human"),
        }
    }
}

/// Read-through cache of prompt templates keyed by (purpose, role).
#[derive(Debug)]
pub struct PromptCatalog {
    dir: PathBuf,
    cache: RwLock<HashMap<(Purpose, PromptRole), Arc<str>>>,
}

impl PromptCatalog {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A catalog pre-filled with templates, for tests and embedding.
    ///
    /// Pairs not supplied fall through to the (empty) directory and fail.
    pub fn with_templates<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = ((Purpose, PromptRole), S)>,
        S: Into<String>,
    {
        let cache = templates
            .into_iter()
            .map(|(key, text)| (key, Arc::from(text.into())))
            .collect();
        Self {
            dir: PathBuf::new(),
            cache: RwLock::new(cache),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the template file for a pair.
    pub fn path_for(&self, purpose: Purpose, role: PromptRole) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", purpose.stem(), role))
    }

    /// Return the template text, reading it from disk on first use.
    pub fn get_prompt(&self, purpose: Purpose, role: PromptRole) -> Result<Arc<str>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(text) = cache.get(&(purpose, role)) {
                return Ok(Arc::clone(text));
            }
        }

        let path = self.path_for(purpose, role);
        let text: Arc<str> = match std::fs::read_to_string(&path) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Prompt template missing");
                return Err(AssistantError::PromptNotFound { purpose, role });
            }
        };
        debug!(purpose = %purpose, role = %role, "Loaded prompt template");

        let mut cache = self
            .cache
            .write()
            .map_err(|e| AssistantError::Config(format!("prompt cache poisoned: {}", e)))?;
        // A concurrent reader may have won the race; keep the first entry.
        let entry = cache.entry((purpose, role)).or_insert(text);
        Ok(Arc::clone(entry))
    }

    /// Load every template the orchestrator uses, failing on the first gap.
    pub fn preload(&self) -> Result<()> {
        for purpose in Purpose::ALL {
            self.get_prompt(purpose, PromptRole::System)?;
        }
        self.get_prompt(Purpose::TextAnalysis, PromptRole::Human)?;
        self.get_prompt(Purpose::TitleGeneration, PromptRole::Human)?;
        Ok(())
    }
}
