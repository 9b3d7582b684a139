//! Typed errors surfaced by the retrieval core.
//!
//! Nothing in the core retries or swallows these; callers (the CLI and the
//! HTTP layer) decide how to present them.

use std::path::PathBuf;

/// Result alias used throughout the retrieval core.
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The external embedding call failed (transport, auth, bad payload, timeout).
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The course catalog file is missing or malformed.
    #[error("failed to load dataset {}: {reason}", .path.display())]
    DatasetLoad { path: PathBuf, reason: String },

    #[error("index not found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// The persisted index exists but could not be decoded.
    #[error("index at {} is corrupt: {reason}", .path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Query vector and index were produced with different dimensions.
    #[error("embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index was built from a different version of the catalog.
    #[error("index holds {index} vectors but catalog has {catalog} courses; rebuild the index")]
    IndexCatalogMismatch { index: usize, catalog: usize },
}

impl RetrievalError {
    /// Stable snake_case label for logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmbeddingService(_) => "embedding_service_error",
            Self::DatasetLoad { .. } => "dataset_load_error",
            Self::IndexNotFound(_) => "index_not_found",
            Self::IndexCorrupt { .. } => "index_corrupt",
            Self::InvalidQuery(_) => "invalid_query",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::IndexCatalogMismatch { .. } => "index_catalog_mismatch",
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dataset(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DatasetLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            RetrievalError::InvalidQuery("empty".into()).kind(),
            "invalid_query"
        );
        assert_eq!(
            RetrievalError::IndexNotFound(PathBuf::from("/tmp/x")).kind(),
            "index_not_found"
        );
        assert_eq!(
            RetrievalError::corrupt("/tmp/x", "bad magic").kind(),
            "index_corrupt"
        );
    }

    #[test]
    fn messages_include_context() {
        let err = RetrievalError::IndexCatalogMismatch {
            index: 3,
            catalog: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('4'));

        let err = RetrievalError::dataset("/data/courses.csv", "missing column");
        assert!(err.to_string().contains("/data/courses.csv"));
    }
}
