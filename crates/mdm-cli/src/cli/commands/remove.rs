//! `mdm remove <id>` – delete a completed download and its file.

use mdm_core::manager::DownloadManager;
use mdm_core::DownloadId;

/// Cancels any transfer still running for `id`, then drops the record and
/// deletes the file. Unknown ids are reported, not treated as errors.
pub async fn run_remove(manager: &DownloadManager, id: DownloadId) {
    match manager.remove(id).await {
        Some(record) => println!("Removed {} ({})", id, record.local_path.display()),
        None => println!("Nothing recorded for {id}"),
    }
}
