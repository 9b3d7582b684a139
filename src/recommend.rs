//! Query engine: free-text query → ranked course records.
//!
//! [`RetrievalService`] owns the catalog, the loaded similarity index and the
//! embedding provider. It is built once at process start and shared by
//! reference (typically `Arc`) between request handlers; nothing in it is
//! mutated after construction, so concurrent reads need no locking.

use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{Catalog, CourseRecord};
use crate::config::CourseFinderConfig;
use crate::embedding::{self, CachedEmbedder, EmbeddingProvider};
use crate::error::{RetrievalError, Result};
use crate::index::normalize::l2_normalize;
use crate::index::SimilarityIndex;

/// Tunables for query handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalOptions {
    /// Optional upper bound on `top_k`; larger requests are rejected.
    pub max_top_k: Option<usize>,
}

/// A ranked result with its similarity score and catalog position.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub course: CourseRecord,
    pub score: f32,
    pub position: usize,
}

pub struct RetrievalService {
    catalog: Catalog,
    index: SimilarityIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    options: RetrievalOptions,
}

impl RetrievalService {
    /// Assemble a service, rejecting an index that does not match the catalog.
    pub fn new(
        catalog: Catalog,
        index: SimilarityIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        options: RetrievalOptions,
    ) -> Result<Self> {
        if index.len() != catalog.len() {
            return Err(RetrievalError::IndexCatalogMismatch {
                index: index.len(),
                catalog: catalog.len(),
            });
        }
        Ok(Self {
            catalog,
            index,
            embedder,
            options,
        })
    }

    /// Load catalog and index from the configured paths and create the embedder.
    pub fn open(config: &CourseFinderConfig) -> Result<Self> {
        let catalog = Catalog::load(config.resolved_catalog_path())?;
        let index = SimilarityIndex::load(config.resolved_index_path())?;

        let provider: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        if index.model() != provider.model() {
            tracing::warn!(
                stored = %index.model(),
                configured = %provider.model(),
                "embedding model changed — run `coursefinder build` to rebuild the index"
            );
        }

        let embedder: Arc<dyn EmbeddingProvider> =
            match NonZeroUsize::new(config.retrieval.query_cache_size) {
                Some(capacity) => Arc::new(CachedEmbedder::new(provider, capacity)),
                None => provider,
            };

        let options = RetrievalOptions {
            max_top_k: config.retrieval.max_top_k,
        };
        Self::new(catalog, index, embedder, options)
    }

    /// Top `top_k` courses for `query`, most similar first.
    pub fn recommend(&self, query: &str, top_k: usize) -> Result<Vec<CourseRecord>> {
        Ok(self
            .recommend_scored(query, top_k)?
            .into_iter()
            .map(|r| r.course)
            .collect())
    }

    /// Like [`recommend`](Self::recommend) but keeps score and catalog position.
    ///
    /// Returns exactly `min(top_k, catalog size)` results. Blank queries fail
    /// with `InvalidQuery`; `top_k == 0`, or `top_k` above a configured
    /// `max_top_k`, fails with `InvalidArgument`. An empty catalog yields an
    /// empty result without calling the embedder.
    pub fn recommend_scored(&self, query: &str, top_k: usize) -> Result<Vec<Recommendation>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery(
                "query must not be empty".into(),
            ));
        }
        if top_k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "top_k must be at least 1".into(),
            ));
        }
        if let Some(max) = self.options.max_top_k {
            if top_k > max {
                return Err(RetrievalError::InvalidArgument(format!(
                    "top_k must be at most {max}, got {top_k}"
                )));
            }
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let mut vector = self.embedder.embed(query)?;
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RetrievalError::EmbeddingService(
                "query embedding contains non-finite values".into(),
            ));
        }
        l2_normalize(&mut vector);

        let hits = self.index.search(&vector, top_k)?;
        let results: Vec<Recommendation> = hits
            .into_iter()
            .filter_map(|hit| {
                self.catalog.get(hit.position).map(|course| Recommendation {
                    course: course.clone(),
                    score: hit.score,
                    position: hit.position,
                })
            })
            .collect();

        tracing::debug!(top_k, results = results.len(), "recommend");
        Ok(results)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn options(&self) -> RetrievalOptions {
        self.options
    }
}
