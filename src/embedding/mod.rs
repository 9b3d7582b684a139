//! Text-to-vector embedding.
//!
//! Provides the [`EmbeddingProvider`] trait and its implementations: a remote
//! OpenAI-compatible client ([`openai`]) and a deterministic offline feature
//! hasher ([`hash`]). [`CachedEmbedder`] wraps any provider with an LRU cache
//! for repeated queries. Providers are created via [`create_provider`].

pub mod cache;
pub mod hash;
pub mod openai;

pub use cache::CachedEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::{RetrievalError, Result};

/// Dimensions used by the hash provider when none are configured.
pub const DEFAULT_HASH_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Vectors are not required to be normalized; the index normalizes on both
/// the build and the query path. All methods are synchronous. Callers in async
/// contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched requests.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded alongside persisted indexes.
    fn model(&self) -> &str;
}

/// Create an embedding provider from config.
///
/// Supported providers: `"openai"` (remote, needs an API key) and `"hash"`
/// (offline, deterministic).
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(openai::OpenAiEmbedder::from_config(config)?)),
        "hash" => Ok(Box::new(hash::HashEmbedder::new(
            config.dimensions.unwrap_or(DEFAULT_HASH_DIM),
        ))),
        other => Err(RetrievalError::EmbeddingService(format!(
            "unknown embedding provider: {other}. Supported: openai, hash"
        ))),
    }
}

/// Model identifier a provider built from `config` reports, without building it.
pub fn configured_model(config: &EmbeddingConfig) -> &str {
    match config.provider.as_str() {
        "hash" => hash::HASH_MODEL,
        _ => &config.model,
    }
}
