//! CLI `doctor` command — check catalog and index artifacts and print a report.

use anyhow::Result;

use coursefinder::catalog::Catalog;
use coursefinder::config::CourseFinderConfig;
use coursefinder::embedding::configured_model;
use coursefinder::index::SimilarityIndex;

/// Check that the catalog and index load and agree with each other.
pub fn doctor(config: &CourseFinderConfig) -> Result<()> {
    let catalog_path = config.resolved_catalog_path();
    let index_path = config.resolved_index_path();
    let embeddings_path = config.resolved_embeddings_path();

    println!("CourseFinder Health Report");
    println!("==========================");
    println!();

    let catalog = match Catalog::load(&catalog_path) {
        Ok(catalog) => {
            println!("Catalog:           {} ({} courses)", catalog_path.display(), catalog.len());
            Some(catalog)
        }
        Err(e) => {
            println!("Catalog:           ERROR {e}");
            None
        }
    };

    let index = match SimilarityIndex::load(&index_path) {
        Ok(index) => {
            println!("Index:             {}", index_path.display());
            println!("  File size:       {}", format_bytes(file_size(&index_path)));
            println!("  Vectors:         {}", index.len());
            println!("  Dimensions:      {}", index.dim());
            Some(index)
        }
        Err(e) => {
            println!("Index:             ERROR {e}");
            println!("  Run `coursefinder build` to create it.");
            None
        }
    };

    if embeddings_path.exists() {
        println!(
            "Embeddings:        {} ({})",
            embeddings_path.display(),
            format_bytes(file_size(&embeddings_path))
        );
    } else {
        println!("Embeddings:        not saved");
    }
    println!();

    if let Some(ref index) = index {
        let configured = configured_model(&config.embedding);
        println!("Embedding model:");
        println!("  Stored:          {}", index.model());
        println!("  Configured:      {configured}");
        if index.model() != configured {
            println!("  WARNING: model mismatch! Run `coursefinder build` to rebuild the index.");
        } else {
            println!("  Status:          OK (match)");
        }
        println!();
    }

    if let (Some(catalog), Some(index)) = (&catalog, &index) {
        if catalog.len() == index.len() {
            println!("Catalog/index:     OK ({} rows)", catalog.len());
        } else {
            println!(
                "Catalog/index:     MISMATCH (catalog {} rows, index {} vectors)",
                catalog.len(),
                index.len()
            );
            println!("  The catalog changed since the last build. Run `coursefinder build`.");
        }
    }

    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
