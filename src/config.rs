use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngramConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub curation: CurationConfig,
    pub hooks: HooksConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Bound on how long a write waits for the store-wide lock before the
    /// caller gets an "engine unavailable" response.
    pub lock_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_max_results: usize,
    /// Hard cap applied to every search regardless of the caller's request.
    pub max_results_cap: usize,
    pub default_similarity_threshold: f64,
    pub similarity_weight: f64,
    pub recency_weight: f64,
    pub complexity_weight: f64,
    /// Recency factor halves every this many days.
    pub recency_half_life_days: f64,
    /// Complexity-match contribution when the record does not match the
    /// caller's context (or no context was supplied).
    pub complexity_partial: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CurationConfig {
    /// Lexical similarity above which two records are near-duplicates.
    pub near_duplicate_threshold: f64,
    /// Default age for the archive operation.
    pub archive_age_days: u32,
    /// Age used by the archive step inside auto-curate.
    pub auto_archive_age_days: u32,
    pub quality_high: f64,
    pub quality_medium: f64,
    /// Records scoring below this are candidates for enhancement.
    pub enhance_quality_floor: f64,
    /// Records older than this count as stale in the health report.
    pub stale_age_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HooksConfig {
    /// Base URL the hook subcommands call.
    pub api_url: String,
    /// Every hook call is bounded by this timeout and fails open.
    pub timeout_secs: u64,
    /// Similarity floor for the pre-action search itself.
    pub search_threshold: f64,
    /// Hits above this similarity become advisories.
    pub advisory_similarity: f64,
    /// Relevance floor for memories attached at session start.
    pub relevant_memory_floor: f64,
    pub max_advisories: usize,
}

impl Default for EngramConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            curation: CurationConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            log_level: "info".into(),
            lock_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_engram_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashed".into(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_results: 3,
            max_results_cap: 10,
            default_similarity_threshold: 0.3,
            similarity_weight: 0.6,
            recency_weight: 0.25,
            complexity_weight: 0.15,
            recency_half_life_days: 30.0,
            complexity_partial: 0.5,
        }
    }
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: 0.85,
            archive_age_days: 90,
            auto_archive_age_days: 180,
            quality_high: 0.8,
            quality_medium: 0.5,
            enhance_quality_floor: 0.5,
            stale_age_days: 90,
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".into(),
            timeout_secs: 3,
            search_threshold: 0.5,
            advisory_similarity: 0.6,
            relevant_memory_floor: 0.4,
            max_advisories: 3,
        }
    }
}

/// Returns `~/.engram/`
pub fn default_engram_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".engram")
}

/// Returns the default config file path: `~/.engram/config.toml`
pub fn default_config_path() -> PathBuf {
    default_engram_dir().join("config.toml")
}

impl EngramConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            EngramConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (ENGRAM_DB, ENGRAM_PORT,
    /// ENGRAM_LOG_LEVEL, ENGRAM_API_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ENGRAM_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("ENGRAM_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("ENGRAM_API_URL") {
            self.hooks.api_url = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
