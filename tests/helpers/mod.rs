#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use coursefinder::catalog::{Catalog, CourseRecord};
use coursefinder::embedding::hash::HashEmbedder;
use coursefinder::embedding::EmbeddingProvider;
use coursefinder::error::{RetrievalError, Result};
use coursefinder::index::builder::build_index;
use coursefinder::recommend::{RetrievalOptions, RetrievalService};

pub const TEST_DIM: usize = 128;

/// The two-course catalog used by the recommendation scenarios.
pub fn ab_catalog() -> Catalog {
    Catalog::from_records(vec![
        CourseRecord::new("A", "desc A", "skill A"),
        CourseRecord::new("B", "desc B", "skill B"),
    ])
}

/// A slightly larger catalog with distinct vocabularies.
pub fn sample_catalog() -> Catalog {
    Catalog::from_records(vec![
        CourseRecord::new(
            "Rust Fundamentals",
            "Ownership, borrowing and lifetimes",
            "rust, systems programming",
        ),
        CourseRecord::new(
            "Python for Data Science",
            "Pandas, numpy and data wrangling",
            "python, data analysis",
        ),
        CourseRecord::new(
            "Intro to Machine Learning",
            "Regression, classification and model evaluation",
            "machine learning, python",
        ),
        CourseRecord::new(
            "Web Development Bootcamp",
            "HTML, CSS and JavaScript from scratch",
            "javascript, html, css",
        ),
        CourseRecord::new(
            "Cloud Fundamentals",
            "Compute, storage and networking on AWS",
            "aws, cloud, devops",
        ),
    ])
}

/// Deterministic offline embedder: texts sharing words get closer vectors.
pub fn hash_embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbedder::new(TEST_DIM))
}

/// Build a ready-to-query service over `catalog` using the hash embedder.
pub fn service_for(catalog: Catalog) -> RetrievalService {
    let embedder = hash_embedder();
    let built = build_index(&catalog, embedder.as_ref(), |_| {}).unwrap();
    RetrievalService::new(catalog, built.index, embedder, RetrievalOptions::default()).unwrap()
}

/// Write a catalog CSV with the standard headers.
pub fn write_catalog(dir: &Path, records: &[CourseRecord]) -> PathBuf {
    let path = dir.join("dataset.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer
        .write_record(["Course Name", "Course Description", "Skills"])
        .unwrap();
    for r in records {
        writer
            .write_record([&r.name, &r.description, &r.skills])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Embedder that always fails, counting how often it was called.
#[derive(Default)]
pub struct FailingEmbedder {
    pub calls: AtomicUsize,
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RetrievalError::EmbeddingService("service unavailable".into()))
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn model(&self) -> &str {
        "failing"
    }
}

/// Embedder that succeeds `ok_calls` times, then fails.
pub struct FlakyEmbedder {
    pub ok_calls: usize,
    pub calls: AtomicUsize,
}

impl EmbeddingProvider for FlakyEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_calls {
            return Err(RetrievalError::EmbeddingService("rate limited".into()));
        }
        HashEmbedder::new(TEST_DIM).embed(text)
    }

    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn model(&self) -> &str {
        "flaky"
    }
}
