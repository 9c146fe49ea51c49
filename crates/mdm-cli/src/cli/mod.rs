//! CLI for the MDM media download manager.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mdm_core::config;
use mdm_core::manager::DownloadManager;
use mdm_core::DownloadId;

use commands::{run_batch, run_checksum, run_get, run_list, run_path, run_remove, GetArgs};

/// Top-level CLI for the MDM media download manager.
#[derive(Debug, Parser)]
#[command(name = "mdm")]
#[command(about = "MDM: download videos for offline playback", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one asset and wait for it to finish.
    Get {
        /// Asset identifier.
        id: DownloadId,
        /// Direct HTTP/HTTPS URL of the video.
        url: String,
        /// Quality tag used in the file name (e.g. hd, 720p).
        #[arg(long, default_value = "sd")]
        quality: String,
        /// Store under this file name instead of `video_<id>_<quality>.<ext>`.
        #[arg(long, value_name = "NAME")]
        file_name: Option<String>,
        /// Download directory (overrides the config file).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// Download every asset listed in a file (`<id> <url> [quality]` per line).
    Batch {
        /// Path to the list file.
        path: PathBuf,
        /// Download directory (overrides the config file).
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },

    /// List completed downloads.
    List,

    /// Print the local path of a completed download.
    Path {
        /// Asset identifier.
        id: DownloadId,
    },

    /// Delete a completed download and its file.
    Remove {
        /// Asset identifier.
        id: DownloadId,
    },

    /// Compute SHA-256 of a completed download.
    Checksum {
        /// Asset identifier.
        id: DownloadId,
        /// Expected hex digest; exit with an error on mismatch.
        #[arg(long, value_name = "HEX")]
        expect: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let manager = DownloadManager::from_config(&cfg).await?;

        match cli.command {
            CliCommand::Get {
                id,
                url,
                quality,
                file_name,
                dir,
            } => {
                let download_dir = match dir {
                    Some(dir) => dir,
                    None => cfg.resolve_download_dir()?,
                };
                let args = GetArgs {
                    id,
                    url,
                    quality,
                    file_name,
                };
                run_get(&manager, &cfg, &download_dir, args).await?
            }
            CliCommand::Batch { path, dir } => {
                let download_dir = match dir {
                    Some(dir) => dir,
                    None => cfg.resolve_download_dir()?,
                };
                run_batch(&manager, &cfg, &download_dir, &path).await?
            }
            CliCommand::List => run_list(&manager),
            CliCommand::Path { id } => run_path(&manager, id)?,
            CliCommand::Remove { id } => run_remove(&manager, id).await,
            CliCommand::Checksum { id, expect } => {
                run_checksum(&manager, id, expect.as_deref()).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
