//! Configuration loaded from a TOML file with `.env` support.
//!
//! Every section has serde defaults so a missing file or empty section yields
//! a runnable configuration. `validate()` rejects nonsensical bounds before
//! any component is constructed with them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache is enabled. A disabled cache is a silent no-op.
    pub enabled: bool,
    /// Maximum number of entries before LRU eviction kicks in.
    pub max_size: usize,
    /// Default TTL in seconds applied when `set` gives no explicit TTL.
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            default_ttl_secs: 3600,
        }
    }
}

/// Admission control limits for the three tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Tier 1: requests per session in the trailing hour.
    pub session_requests_per_hour: u64,
    /// Tier 2: requests per portfolio per calendar day.
    pub daily_requests_per_portfolio: u64,
    /// Tier 3: requests per portfolio per calendar month.
    pub monthly_requests_per_portfolio: u64,
    /// Minimum interval between idle-session cleanup passes.
    pub session_cleanup_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            session_requests_per_hour: 10,
            daily_requests_per_portfolio: 100,
            monthly_requests_per_portfolio: 2000,
            session_cleanup_interval_secs: 3600,
        }
    }
}

/// Chat orchestration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum retrieved context snippets fed into the prompt.
    pub max_context_results: usize,
    /// How many trailing conversation messages are kept in the prompt.
    pub history_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_context_results: 3,
            history_window: 5,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub chat: ChatConfig,
}

impl Config {
    /// Load configuration from a TOML file, applying `.env` first.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        // Best-effort .env load so deployments can keep secrets out of TOML.
        let _ = dotenvy::dotenv();

        let config = match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str::<Config>(&raw)
                .map_err(|e| FolioError::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Config::default()
            }
            Err(e) => {
                return Err(FolioError::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject bounds that would make the core misbehave rather than run with
    /// them.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            return Err(FolioError::Config(
                "cache.max_size must be greater than 0".to_string(),
            ));
        }
        if self.cache.default_ttl_secs == 0 {
            return Err(FolioError::Config(
                "cache.default_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.limits.session_requests_per_hour == 0 {
            return Err(FolioError::Config(
                "limits.session_requests_per_hour must be greater than 0".to_string(),
            ));
        }
        if self.limits.daily_requests_per_portfolio == 0
            || self.limits.monthly_requests_per_portfolio == 0
        {
            return Err(FolioError::Config(
                "limits.daily/monthly_requests_per_portfolio must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
