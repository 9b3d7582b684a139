//! Exact inner-product similarity index over L2-normalized vectors.
//!
//! Rows are stored in catalog order, so a search result is a catalog position.
//! Search is a brute-force matrix-vector product, which is exact and fast
//! enough for catalogs of tens of thousands of courses.
//!
//! - [`normalize`] — L2 normalization helpers
//! - [`persist`] — binary on-disk format ([`SimilarityIndex::save`] / [`SimilarityIndex::load`])
//! - [`npy`] — NumPy `.npy` export/import of the raw embedding matrix
//! - [`builder`] — offline build from a catalog and an embedding provider

pub mod builder;
pub mod normalize;
pub mod npy;
pub mod persist;

use ndarray::{concatenate, Array2, ArrayView1, Axis};

use crate::error::{RetrievalError, Result};

/// One search hit: catalog position and inner-product score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    model: String,
    vectors: Array2<f32>,
}

impl SimilarityIndex {
    /// Empty index for vectors of `dim` dimensions.
    pub fn new(dim: usize, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            vectors: Array2::zeros((0, dim)),
        }
    }

    /// Wrap an already-normalized matrix, one row per catalog record.
    pub fn from_matrix(vectors: Array2<f32>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            vectors,
        }
    }

    /// Append normalized rows after the existing ones.
    pub fn add(&mut self, rows: &Array2<f32>) -> Result<()> {
        if rows.ncols() != self.dim() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim(),
                actual: rows.ncols(),
            });
        }
        self.vectors = concatenate(Axis(0), &[self.vectors.view(), rows.view()])
            .map_err(|e| RetrievalError::InvalidArgument(e.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Model identifier the vectors were produced with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// Stored vector at `position`.
    pub fn vector(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.len()).then(|| self.vectors.row(position))
    }

    /// Top `k` rows by inner product with `query`, best first.
    ///
    /// Ties are broken by ascending position, so results are deterministic for
    /// a fixed index and query. `query` is expected to be normalized already.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            });
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));
        let mut hits: Vec<SearchHit> = scores
            .iter()
            .enumerate()
            .map(|(position, &score)| SearchHit { position, score })
            .collect();

        let by_rank = |a: &SearchHit, b: &SearchHit| {
            rank_key(b.score)
                .total_cmp(&rank_key(a.score))
                .then(a.position.cmp(&b.position))
        };
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_by(by_rank);
        Ok(hits)
    }
}

/// NaN scores rank below every real score.
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
