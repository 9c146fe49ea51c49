//! `mdm get <id> <url>` – download one asset in the foreground.

use std::path::Path;

use anyhow::Result;
use mdm_core::config::MdmConfig;
use mdm_core::manager::{DownloadManager, DownloadRequest};
use mdm_core::naming;
use mdm_core::DownloadId;

use super::follow::follow;

#[derive(Debug)]
pub struct GetArgs {
    pub id: DownloadId,
    pub url: String,
    pub quality: String,
    pub file_name: Option<String>,
}

pub(super) fn build_request(download_dir: &Path, args: GetArgs) -> DownloadRequest {
    let name = args
        .file_name
        .as_deref()
        .map(naming::sanitize_file_name)
        .filter(|n| !n.is_empty());
    match name {
        Some(name) => DownloadRequest::new(args.id, args.url, download_dir.join(&name), name),
        None => DownloadRequest::for_asset(download_dir, args.id, &args.url, &args.quality),
    }
}

pub async fn run_get(
    manager: &DownloadManager,
    cfg: &MdmConfig,
    download_dir: &Path,
    args: GetArgs,
) -> Result<()> {
    let request = build_request(download_dir, args);
    let id = request.id;
    println!("{}: downloading to {}", id, request.destination.display());

    let events = manager.subscribe_events();
    manager.start(request)?;
    follow(manager, events, &[id], cfg.shutdown_timeout())
        .await
        .into_result()
}
