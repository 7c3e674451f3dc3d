use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod atlas;

use atlas::AtlasManager;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Sample data tasks for the Swiss skull stripper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the SwissSkullStripper atlas image and mask
    DownloadAtlas {
        /// Output directory for the atlas
        #[arg(short, long, default_value = "atlas_data")]
        output: PathBuf,

        /// Force re-download even if files exist
        #[arg(short, long)]
        force: bool,
    },

    /// Check the downloaded atlas files
    VerifyAtlas {
        /// Directory containing the atlas
        #[arg(short, long, default_value = "atlas_data")]
        data_dir: PathBuf,
    },

    /// Remove the downloaded atlas
    Clean {
        /// Directory containing the atlas
        #[arg(short, long, default_value = "atlas_data")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DownloadAtlas { output, force } => {
            download_atlas(&output, force)?;
        }
        Commands::VerifyAtlas { data_dir } => {
            verify_atlas(&data_dir)?;
        }
        Commands::Clean { data_dir } => {
            clean_atlas(&data_dir)?;
        }
    }

    Ok(())
}

fn download_atlas(output: &Path, force: bool) -> Result<()> {
    info!("Downloading atlas to: {}", output.display());
    AtlasManager::new(output).download(force)?;
    info!("Atlas download complete!");
    Ok(())
}

fn verify_atlas(data_dir: &Path) -> Result<()> {
    info!("Verifying atlas in: {}", data_dir.display());

    if !data_dir.exists() {
        warn!("Data directory does not exist: {}", data_dir.display());
        anyhow::bail!(
            "Atlas directory {} does not exist. Run 'cargo xtask download-atlas' first.",
            data_dir.display()
        );
    }

    for file in AtlasManager::new(data_dir).verify()? {
        println!(
            "{}  {} ({} {}, size {:?})",
            file.sha256,
            file.path.display(),
            file.info.pixel,
            file.info.component,
            file.info.size
        );
    }

    info!("Atlas verification complete!");
    Ok(())
}

fn clean_atlas(data_dir: &Path) -> Result<()> {
    if data_dir.exists() {
        info!("Removing atlas directory: {}", data_dir.display());
        std::fs::remove_dir_all(data_dir)?;
        info!("Atlas cleaned successfully");
    } else {
        info!("No atlas to clean");
    }
    Ok(())
}
