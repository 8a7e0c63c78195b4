use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog_derivatives::{
    admin_preview_html, derivative_url, derivative_urls, BaseName, DerivativeFormat,
    DerivativeGenerator, DerivativeIndex, MediaConfig,
};

#[derive(Parser)]
#[command(name = "catalog-derivatives")]
#[command(about = "Generate and clean up resized catalog image derivatives", long_about = None)]
struct Cli {
    /// JSON config file ({"media_root": ..., "index_path": ...})
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Media root; overrides the config file and CATALOG_MEDIA_ROOT
    #[arg(long, global = true)]
    media_root: Option<PathBuf>,

    /// Derivative index database; overrides the config file and CATALOG_DERIVATIVE_INDEX
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the 12 derivatives of a source image, then delete it
    Generate {
        /// Source image, absolute or relative to the media root
        source: PathBuf,

        /// Stem for derivative names (defaults to the source file name stem)
        #[arg(long)]
        base_name: Option<String>,
    },

    /// Remove all derivatives of a base name from a directory
    Purge {
        /// Directory, absolute or relative to the media root
        directory: PathBuf,
        base_name: String,

        /// Exact file name of the original, removed too if still present
        #[arg(long)]
        original: Option<String>,
    },

    /// Print the URL of one derivative
    Url {
        original_url: String,
        size: u32,
        /// jpg, webp or avif
        format: DerivativeFormat,
    },

    /// Print all 12 derivative URLs and the admin preview snippet
    Urls { original_url: String },

    /// Drop index entries whose files no longer exist
    Verify,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_derivatives=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Generate { source, base_name } => {
            let generator = DerivativeGenerator::from_config(&config)?;
            let base = match base_name {
                Some(name) => BaseName::new(name)?,
                None => {
                    let file_name = source
                        .file_name()
                        .and_then(|n| n.to_str())
                        .with_context(|| format!("no file name in {}", source.display()))?;
                    BaseName::from_file_name(file_name)?
                }
            };

            match generator.generate(&source, &base)? {
                Some(set) => println!("{}", serde_json::to_string_pretty(&set)?),
                None => tracing::warn!("Source {} not found; nothing generated", source.display()),
            }
        }
        Commands::Purge {
            directory,
            base_name,
            original,
        } => {
            let generator = DerivativeGenerator::from_config(&config)?;
            let removed = generator.purge(&BaseName::new(base_name)?, &directory, original.as_deref())?;
            println!("{}", removed);
        }
        Commands::Url {
            original_url,
            size,
            format,
        } => {
            println!("{}", derivative_url(&original_url, size, format));
        }
        Commands::Urls { original_url } => {
            for (_, _, url) in derivative_urls(&original_url) {
                println!("{}", url);
            }
            println!("{}", admin_preview_html(&original_url));
        }
        Commands::Verify => {
            let path = config
                .index_path
                .clone()
                .unwrap_or_else(MediaConfig::default_index_path);
            let index = DerivativeIndex::open(&path)?;
            let dropped = index.verify_sets()?;
            println!("{} sets dropped, {} remain", dropped, index.set_count()?);
        }
    }

    Ok(())
}

/// Config file (or defaults), then environment, then command line flags
fn load_config(cli: &Cli) -> Result<MediaConfig> {
    let mut config = match &cli.config {
        Some(path) => MediaConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MediaConfig::default(),
    }
    .apply_env();

    if let Some(root) = &cli.media_root {
        config.media_root = root.clone();
    }
    if let Some(index) = &cli.index {
        config.index_path = Some(index.clone());
    }
    Ok(config)
}
