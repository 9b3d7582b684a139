//! Course catalog loading.
//!
//! A catalog is an ordered list of [`CourseRecord`]s read from a CSV file with
//! `Course Name`, `Course Description` and `Skills` columns. A record's identity
//! is its row position, which the similarity index relies on: vector `i` in the
//! index always describes record `i` here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RetrievalError, Result};

pub const NAME_COLUMN: &str = "Course Name";
pub const DESCRIPTION_COLUMN: &str = "Course Description";
pub const SKILLS_COLUMN: &str = "Skills";

/// One row of the course catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "course_name")]
    pub name: String,
    #[serde(rename = "course_description")]
    pub description: String,
    pub skills: String,
}

impl CourseRecord {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        skills: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            skills: skills.into(),
        }
    }

    /// Text fed to the embedder: name, description and skills joined by single spaces.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.name, self.description, self.skills)
    }
}

/// Ordered, read-only set of course records.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CourseRecord>,
}

impl Catalog {
    pub fn from_records(records: Vec<CourseRecord>) -> Self {
        Self { records }
    }

    /// Read a catalog from a CSV file. Missing cells become empty strings.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RetrievalError::dataset(path, "file not found"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| RetrievalError::dataset(path, e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| RetrievalError::dataset(path, e.to_string()))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| RetrievalError::dataset(path, format!("missing column '{name}'")))
        };
        let name_idx = column(NAME_COLUMN)?;
        let desc_idx = column(DESCRIPTION_COLUMN)?;
        let skills_idx = column(SKILLS_COLUMN)?;

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                RetrievalError::dataset(path, format!("row {}: {e}", row + 1))
            })?;
            let cell = |idx: usize| record.get(idx).unwrap_or_default().to_string();
            records.push(CourseRecord {
                name: cell(name_idx),
                description: cell(desc_idx),
                skills: cell(skills_idx),
            });
        }

        tracing::info!(path = %path.display(), courses = records.len(), "catalog loaded");
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at catalog position `position`.
    pub fn get(&self, position: usize) -> Option<&CourseRecord> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    /// Embedding input text for every record, in catalog order.
    pub fn embedding_texts(&self) -> Vec<String> {
        self.records.iter().map(CourseRecord::embedding_text).collect()
    }
}
