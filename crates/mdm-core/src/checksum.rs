//! SHA-256 of completed downloads, computed on demand.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::catalog::DownloadRecord;

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of a file, streamed in fixed-size reads.
pub fn sha256_path(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).with_context(|| format!("read {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hash the file behind a catalog record on the blocking pool.
pub async fn sha256_record(record: &DownloadRecord) -> Result<String> {
    let path = record.local_path.clone();
    tokio::task::spawn_blocking(move || sha256_path(&path))
        .await
        .context("checksum task failed")?
}

/// Compare against a user-supplied digest, ignoring case and surrounding whitespace.
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}
