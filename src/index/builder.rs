//! Offline index build: embed every catalog row, normalize, index.
//!
//! The build is all-or-nothing. Nothing is written to disk here; callers
//! persist the returned [`BuiltIndex`] only after every embedding succeeded.

use ndarray::Array2;

use super::normalize::normalize_rows;
use super::SimilarityIndex;
use crate::catalog::Catalog;
use crate::embedding::EmbeddingProvider;
use crate::error::{RetrievalError, Result};

/// Output of a successful build.
pub struct BuiltIndex {
    pub index: SimilarityIndex,
    /// Embeddings as returned by the provider, before normalization.
    pub raw_embeddings: Array2<f32>,
}

/// Embed every record (sequentially, in catalog order) and build the index.
///
/// `on_progress` is called with the number of records embedded so far.
pub fn build_index(
    catalog: &Catalog,
    provider: &dyn EmbeddingProvider,
    mut on_progress: impl FnMut(usize),
) -> Result<BuiltIndex> {
    let mut dim = None;
    let mut values = Vec::new();

    for (position, record) in catalog.records().iter().enumerate() {
        let vector = provider.embed(&record.embedding_text()).map_err(|e| {
            tracing::error!(
                position,
                course = %record.name,
                error = %e,
                "embedding failed, aborting build"
            );
            e
        })?;

        let expected = *dim.get_or_insert(vector.len());
        if vector.is_empty() || vector.len() != expected {
            return Err(RetrievalError::EmbeddingService(format!(
                "course {position} ('{}') produced a {}-dimensional vector, expected {expected}",
                record.name,
                vector.len()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RetrievalError::EmbeddingService(format!(
                "course {position} ('{}') produced non-finite values",
                record.name
            )));
        }
        values.extend_from_slice(&vector);
        on_progress(position + 1);
    }

    let dim = dim.unwrap_or_else(|| provider.dimensions());
    let raw_embeddings = Array2::from_shape_vec((catalog.len(), dim), values)
        .map_err(|e| RetrievalError::EmbeddingService(e.to_string()))?;

    let index = index_from_embeddings(raw_embeddings.clone(), provider.model())?;
    let zero_rows = count_zero_rows(index.vectors());
    if zero_rows > 0 {
        tracing::warn!(zero_rows, "courses with zero vectors score 0 against every query");
    }
    tracing::info!(courses = index.len(), dim = index.dim(), model = %index.model(), "index built");

    Ok(BuiltIndex {
        index,
        raw_embeddings,
    })
}

/// Normalize a raw embedding matrix (one row per course) into an index.
///
/// Rows containing NaN or infinity are rejected.
pub fn index_from_embeddings(mut matrix: Array2<f32>, model: &str) -> Result<SimilarityIndex> {
    if let Some(row) = matrix
        .rows()
        .into_iter()
        .position(|row| row.iter().any(|x| !x.is_finite()))
    {
        return Err(RetrievalError::InvalidArgument(format!(
            "embedding row {row} contains non-finite values"
        )));
    }
    normalize_rows(&mut matrix);
    Ok(SimilarityIndex::from_matrix(matrix, model))
}

fn count_zero_rows(matrix: &Array2<f32>) -> usize {
    matrix
        .rows()
        .into_iter()
        .filter(|row| row.iter().all(|x| *x == 0.0))
        .count()
}
