//! `mdm batch <file>` – start every listed download, then wait for all of them.
//!
//! List format, one asset per line: `<id> <url> [quality]`. Blank lines and
//! lines starting with `#` are ignored.

use std::path::Path;

use anyhow::{bail, Context, Result};
use mdm_core::config::MdmConfig;
use mdm_core::manager::{DownloadManager, DownloadRequest, StartRejected};
use mdm_core::DownloadId;

use super::follow::follow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: DownloadId,
    pub url: String,
    pub quality: Option<String>,
}

pub fn parse_batch(text: &str) -> Result<Vec<BatchEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lineno = idx + 1;
        let mut fields = line.split_whitespace();
        let id = fields
            .next()
            .unwrap_or_default()
            .parse::<DownloadId>()
            .with_context(|| format!("line {lineno}: invalid id"))?;
        let Some(url) = fields.next() else {
            bail!("line {lineno}: missing url");
        };
        let quality = fields.next().map(str::to_string);
        if fields.next().is_some() {
            bail!("line {lineno}: expected `<id> <url> [quality]`");
        }
        entries.push(BatchEntry {
            id,
            url: url.to_string(),
            quality,
        });
    }
    Ok(entries)
}

pub async fn run_batch(
    manager: &DownloadManager,
    cfg: &MdmConfig,
    download_dir: &Path,
    list: &Path,
) -> Result<()> {
    let text = tokio::fs::read_to_string(list)
        .await
        .with_context(|| format!("read {}", list.display()))?;
    let entries = parse_batch(&text)?;

    let events = manager.subscribe_events();
    let mut started = Vec::with_capacity(entries.len());
    for entry in entries {
        let quality = entry.quality.as_deref().unwrap_or("sd");
        let request = DownloadRequest::for_asset(download_dir, entry.id, &entry.url, quality);
        match manager.start(request) {
            Ok(()) => started.push(entry.id),
            Err(StartRejected::AlreadyDownloaded(id)) => println!("{id}: already downloaded"),
            Err(e) => println!("{}: skipped: {}", entry.id, e),
        }
    }
    if started.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }

    println!("Downloading {} asset(s) into {}", started.len(), download_dir.display());
    follow(manager, events, &started, cfg.shutdown_timeout())
        .await
        .into_result()
}
