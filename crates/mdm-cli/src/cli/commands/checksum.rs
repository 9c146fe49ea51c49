//! `mdm checksum <id>` – SHA-256 of a completed download.

use anyhow::{bail, Result};
use mdm_core::checksum;
use mdm_core::manager::DownloadManager;
use mdm_core::DownloadId;

pub async fn run_checksum(
    manager: &DownloadManager,
    id: DownloadId,
    expect: Option<&str>,
) -> Result<()> {
    let record = manager.record(id)?;
    let digest = checksum::sha256_record(&record).await?;
    println!("{}  {}", digest, record.local_path.display());
    if let Some(expected) = expect {
        if !checksum::digest_matches(&digest, expected) {
            bail!("checksum mismatch for {}: expected {}", id, expected.trim());
        }
    }
    Ok(())
}
