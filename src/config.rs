use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CourseFinderConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub path: String,
    pub embeddings_path: String,
    pub save_embeddings: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    /// Reject requests asking for more results than this. Unset means no cap.
    pub max_top_k: Option<usize>,
    pub query_cache_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            log_level: "info".into(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_data_path("dataset.csv"),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_data_path("index.cfx"),
            embeddings_path: default_data_path("embeddings.npy"),
            save_embeddings: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: None,
            query_cache_size: 256,
        }
    }
}

/// Returns `~/.coursefinder/`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".coursefinder")
}

/// Returns the default config file path: `~/.coursefinder/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

fn default_data_path(file: &str) -> String {
    default_data_dir().join(file).to_string_lossy().into_owned()
}

impl CourseFinderConfig {
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
            CourseFinderConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (COURSEFINDER_*, OPENAI_API_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COURSEFINDER_CATALOG") {
            self.catalog.path = val;
        }
        if let Ok(val) = std::env::var("COURSEFINDER_INDEX") {
            self.index.path = val;
        }
        if let Ok(val) = std::env::var("COURSEFINDER_EMBEDDINGS") {
            self.index.embeddings_path = val;
        }
        if let Ok(val) = std::env::var("COURSEFINDER_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("COURSEFINDER_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.embedding.api_key = Some(val);
        }
    }

    pub fn resolved_catalog_path(&self) -> PathBuf {
        expand_tilde(&self.catalog.path)
    }

    pub fn resolved_index_path(&self) -> PathBuf {
        expand_tilde(&self.index.path)
    }

    pub fn resolved_embeddings_path(&self) -> PathBuf {
        expand_tilde(&self.index.embeddings_path)
    }

    /// `host:port` for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
