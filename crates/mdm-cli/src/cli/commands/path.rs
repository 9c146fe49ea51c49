//! `mdm path <id>` – print where a completed download lives.

use anyhow::Result;
use mdm_core::manager::DownloadManager;
use mdm_core::DownloadId;

pub fn run_path(manager: &DownloadManager, id: DownloadId) -> Result<()> {
    let record = manager.record(id)?;
    if !record.local_path.exists() {
        tracing::warn!(id, path = %record.local_path.display(), "recorded file is missing");
    }
    println!("{}", record.local_path.display());
    Ok(())
}
