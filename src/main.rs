//! Gallery sync CLI
//!
//! ```bash
//! # List the public gallery, newest first
//! gallery-sync list
//!
//! # Upload two images into the private gallery
//! gallery-sync --area private upload a.jpg b.jpg
//!
//! # Delete an image
//! gallery-sync delete a.jpg
//! ```

use clap::{Parser, Subcommand};
use env_logger::Env;
use gallery_sync::models::Area;
use gallery_sync::services::{GalleryStateStore, GallerySyncManager, PendingUpload, WatchStateStore};
use gallery_sync::{GalleryConfig, GalleryError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Keeps an image gallery in sync with its store
#[derive(Parser)]
#[command(name = "gallery-sync")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "gallery.toml")]
    config: PathBuf,

    /// Gallery area to work on
    #[arg(short, long, global = true, default_value = "public")]
    area: Area,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List images, newest first
    List,

    /// Upload one or more image files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete an image by name
    Delete { name: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<GalleryConfig, GalleryError> {
    if path.exists() {
        GalleryConfig::load(path)
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Ok(GalleryConfig::default())
    }
}

async fn run(cli: Cli) -> Result<(), GalleryError> {
    let config = load_config(&cli.config)?;
    let store = config.open_store()?;
    let state = Arc::new(WatchStateStore::new());
    let manager = GallerySyncManager::new(store, state, config);

    match cli.command {
        Commands::List => {
            let report = manager.select_area(cli.area).await?;
            let current = manager.state().get();
            for image in current.current_images().as_slice() {
                println!(
                    "{}\t{}\t{}",
                    image.mtime.format("%Y-%m-%d %H:%M:%S"),
                    image.size,
                    image.name
                );
            }
            for failure in &report.failures {
                eprintln!("skipped {}: {}", failure.name, failure.error);
            }
        }
        Commands::Upload { files } => {
            let mut pending = Vec::with_capacity(files.len());
            for file in &files {
                let name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| GalleryError::InvalidName(file.display().to_string()))?;
                let bytes = tokio::fs::read(file).await.map_err(|e| {
                    GalleryError::Other(format!("Failed to read {}: {}", file.display(), e))
                })?;
                pending.push(PendingUpload::new(name, bytes));
            }

            let report = manager.handle_batch_upload(cli.area, pending).await;
            for upload in &report.uploads {
                match &upload.result {
                    Ok(()) => println!("uploaded {}", upload.name),
                    Err(e) => eprintln!("{}: {}", upload.name, e.user_message()),
                }
            }
            if let Err(e) = &report.refresh {
                eprintln!("refresh failed: {}", e.user_message());
            }
            if report.failed() > 0 {
                return Err(GalleryError::Other(format!(
                    "{} of {} uploads failed",
                    report.failed(),
                    report.uploads.len()
                )));
            }
        }
        Commands::Delete { name } => {
            manager.delete_image(cli.area, &name).await?;
            println!("deleted {}", name);
        }
    }
    Ok(())
}
