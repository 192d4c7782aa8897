//! Runtime settings
//!
//! Settings are resolved once at startup: an optional TOML file is read
//! first, then environment variables override individual keys. The
//! resolved value is passed explicitly to whatever needs it.
//!
//! ```toml
//! [cache]
//! ephemeral_ttl_secs = 3600
//! persistent_ttl_secs = 2592000   # omit to keep entries forever
//!
//! [ai]
//! temperature = 0.1
//! max_tokens = 50
//! timeout_secs = 30
//!
//! [jobs]
//! max_concurrent = 4
//! max_attempts = 3
//! retry_delay_secs = 5
//!
//! [pluggy]
//! base_url = "https://api.pluggy.ai"
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Classification cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Lifetime of tier-1 (in-process) entries
    pub ephemeral_ttl_secs: u64,
    /// Lifetime of tier-2 (database) entries; None keeps them forever
    pub persistent_ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ephemeral_ttl_secs: 3600,
            persistent_ttl_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn ephemeral_ttl(&self) -> Duration {
        Duration::from_secs(self.ephemeral_ttl_secs)
    }

    pub fn persistent_ttl(&self) -> Option<Duration> {
        self.persistent_ttl_secs.map(Duration::from_secs)
    }
}

/// LLM request settings (the backend itself is picked from the environment)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 50,
            timeout_secs: 30,
        }
    }
}

impl AiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Background job settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Jobs allowed to run at the same time
    pub max_concurrent: usize,
    /// Attempts per job before it is marked failed
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

impl JobSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Aggregation API settings. The API key only comes from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluggySettings {
    pub base_url: String,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for PluggySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.pluggy.ai".to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl PluggySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// All runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub ai: AiSettings,
    pub jobs: JobSettings,
    pub pluggy: PluggySettings,
}

/// Default settings file location (`~/.config/gasto/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gasto").join("config.toml"))
}

impl Settings {
    /// Resolve settings from a file (if any) and the process environment
    ///
    /// An explicitly given path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
                    None
                }
            }
        }

        if let Some(v) = parsed(&lookup, "GASTO_CACHE_TTL_SECS") {
            self.cache.ephemeral_ttl_secs = v;
        }
        if let Some(v) = parsed(&lookup, "GASTO_PERSISTENT_CACHE_TTL_SECS") {
            self.cache.persistent_ttl_secs = Some(v);
        }
        if let Some(v) = parsed(&lookup, "GASTO_AI_TIMEOUT_SECS") {
            self.ai.timeout_secs = v;
        }
        if let Some(v) = parsed::<usize>(&lookup, "GASTO_MAX_CONCURRENT_JOBS") {
            self.jobs.max_concurrent = v.max(1);
        }
        if let Some(v) = parsed::<u32>(&lookup, "GASTO_JOB_MAX_ATTEMPTS") {
            self.jobs.max_attempts = v.max(1);
        }
        if let Some(v) = lookup("PLUGGY_BASE_URL").filter(|s| !s.trim().is_empty()) {
            self.pluggy.base_url = v.trim().trim_end_matches('/').to_string();
        }
        self.pluggy.api_key = lookup("PLUGGY_API_KEY").filter(|s| !s.trim().is_empty());
    }

    fn validate(&self) -> Result<()> {
        if self.jobs.max_concurrent == 0 {
            return Err(Error::InvalidData(
                "jobs.max_concurrent must be at least 1".into(),
            ));
        }
        if self.jobs.max_attempts == 0 {
            return Err(Error::InvalidData("jobs.max_attempts must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(Error::InvalidData(
                "ai.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }
}
