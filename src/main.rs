mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coursefinder::config::CourseFinderConfig;
use coursefinder::server;

#[derive(Parser)]
#[command(name = "coursefinder", version, about = "Semantic course recommendation backend")]
struct Cli {
    /// Config file (defaults to ~/.coursefinder/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP recommendation API
    Serve,
    /// Embed the course catalog and write the similarity index
    Build {
        /// Rebuild from the saved embedding matrix without calling the embedder
        #[arg(long)]
        from_embeddings: bool,
        /// Do not write the raw embedding matrix
        #[arg(long)]
        no_save_embeddings: bool,
    },
    /// Recommend courses for a query
    Search {
        query: String,
        /// Number of courses to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Check catalog and index health
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CourseFinderConfig::load_from(path)?,
        None => CourseFinderConfig::load()?,
    };

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Embedding calls are blocking; only the HTTP server needs an async runtime.
    match cli.command {
        Command::Serve => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(config))?;
        }
        Command::Build {
            from_embeddings,
            no_save_embeddings,
        } => {
            let options = cli::build::BuildOptions {
                from_embeddings,
                no_save_embeddings,
            };
            cli::build::build(&config, &options)?;
        }
        Command::Search { query, top_k } => {
            cli::search::search(&config, &query, top_k)?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
