//! Deterministic offline embeddings via FNV-1a feature hashing.
//!
//! Every lowercase alphanumeric token (and each adjacent token pair) is hashed
//! into signed buckets, so texts sharing words land close together. No model
//! or network access is needed, which makes this provider suitable for local
//! development and tests.

use super::EmbeddingProvider;
use crate::error::Result;

/// Model identifier recorded for indexes built with this provider.
pub const HASH_MODEL: &str = "fnv1a-hash";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dim];
        let tokens = tokenize(text);

        for token in &tokens {
            accumulate(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            accumulate(&mut embedding, &format!("{} {}", window[0], window[1]), 0.5);
        }
        embedding
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        HASH_MODEL
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn accumulate(embedding: &mut [f32], token: &str, weight: f32) {
    let hash = fnv1a(token.as_bytes());
    let bucket = (hash >> 1) as usize % embedding.len();
    let sign = if hash & 1 == 0 { weight } else { -weight };
    embedding[bucket] += sign;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}
