//! CLI `build` command — embed the catalog and persist the similarity index.

use anyhow::{Context, Result};

use coursefinder::catalog::Catalog;
use coursefinder::config::CourseFinderConfig;
use coursefinder::embedding;
use coursefinder::index::builder::{build_index, index_from_embeddings};
use coursefinder::index::npy;

pub struct BuildOptions {
    /// Rebuild from the saved raw embedding matrix instead of calling the embedder.
    pub from_embeddings: bool,
    /// Skip writing the raw embedding matrix.
    pub no_save_embeddings: bool,
}

/// Build the index from the configured catalog. Nothing is written unless
/// every course was embedded and every output file was fully staged.
pub fn build(config: &CourseFinderConfig, options: &BuildOptions) -> Result<()> {
    let catalog_path = config.resolved_catalog_path();
    let index_path = config.resolved_index_path();
    let embeddings_path = config.resolved_embeddings_path();

    let catalog = Catalog::load(&catalog_path)?;

    if options.from_embeddings {
        let matrix = npy::read_npy(&embeddings_path).with_context(|| {
            format!("failed to load embeddings from {}", embeddings_path.display())
        })?;
        anyhow::ensure!(
            matrix.nrows() == catalog.len(),
            "{} has {} rows but the catalog has {} courses; run a full build",
            embeddings_path.display(),
            matrix.nrows(),
            catalog.len()
        );

        let configured = embedding::configured_model(&config.embedding);
        let model = match npy::read_model_tag(&embeddings_path)? {
            Some(recorded) => {
                if recorded != configured {
                    println!(
                        "Warning: embeddings were produced by '{recorded}' but '{configured}' is configured; queries will not match until a full build"
                    );
                }
                recorded
            }
            None => {
                println!(
                    "Warning: no model recorded for {}; assuming '{configured}'",
                    embeddings_path.display()
                );
                configured.to_string()
            }
        };

        let index = index_from_embeddings(matrix, &model)?;
        index.save(&index_path)?;
        println!(
            "Rebuilt index for {} courses from {} -> {}",
            index.len(),
            embeddings_path.display(),
            index_path.display()
        );
        return Ok(());
    }

    let provider = embedding::create_provider(&config.embedding)
        .context("failed to create embedding provider")?;

    println!(
        "Embedding {} courses with model '{}'...",
        catalog.len(),
        provider.model()
    );
    let pb = super::progress_bar(catalog.len());
    let built = build_index(&catalog, provider.as_ref(), |done| pb.set_position(done as u64));
    pb.finish_and_clear();
    let built = built.context("index build failed; no files were written")?;

    // Stage everything before replacing anything; a failure here drops the
    // staged files and leaves the previous artifacts in place.
    let mut staged = Vec::new();
    let save_embeddings = config.index.save_embeddings && !options.no_save_embeddings;
    if save_embeddings {
        staged.push(npy::stage_npy(&embeddings_path, &built.raw_embeddings)?);
        staged.push(npy::stage_model_tag(&embeddings_path, built.index.model())?);
    }
    // Index last: it is what the server loads.
    staged.push(built.index.stage(&index_path)?);
    for file in staged {
        let dest = file.path().to_path_buf();
        file.commit()
            .with_context(|| format!("failed to replace {}", dest.display()))?;
    }

    if save_embeddings {
        println!("Embeddings saved to {}", embeddings_path.display());
    }
    println!(
        "Indexed {} courses ({} dimensions) -> {}",
        built.index.len(),
        built.index.dim(),
        index_path.display()
    );
    Ok(())
}
