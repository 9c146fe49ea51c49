//! Per-transfer task: wait for a slot, drive the engine, settle the outcome.
//!
//! The bookkeeping lock is only taken for short map updates; network and
//! disk work happen on the blocking pool inside the engine.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::DownloadRecord;
use crate::engine::{self, FetchRequest, TransferError, TransferEvent, TransferOutcome};
use crate::progress::Progress;

use super::{DownloadEvent, DownloadRequest, Inner};

pub(super) async fn run_transfer(
    inner: Arc<Inner>,
    request: DownloadRequest,
    cancel: CancellationToken,
    finished: watch::Sender<bool>,
) {
    // Semaphore waiters are served FIFO, so queued requests start in order.
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        permit = Arc::clone(&inner.slots).acquire_owned() => permit.ok(),
    };

    let outcome = match &permit {
        Some(_) if !cancel.is_cancelled() => drive(&inner, &request, &cancel).await,
        _ => TransferOutcome::Cancelled,
    };

    settle(&inner, &request, outcome).await;
    // The slot is released only after the bookkeeping entry is gone.
    drop(permit);
    let _ = finished.send(true);
}

async fn drive(
    inner: &Inner,
    request: &DownloadRequest,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let id = request.id;
    inner.book().mark_in_progress(id);
    inner.progress.publish(id, Progress::Percent(0.0));
    tracing::debug!(id, url = %request.url, "transfer started");

    let mut handle = engine::spawn_fetch(
        Arc::clone(&inner.engine),
        FetchRequest::new(request.url.clone(), &request.destination),
        cancel.clone(),
    );
    while let Some(event) = handle.next_event().await {
        match event {
            TransferEvent::Progress(p) => {
                let progress = inner
                    .book()
                    .record_progress(id, p.bytes_transferred, p.bytes_total);
                // 100% is published once the record is committed.
                if let Some(progress) = progress.filter(|p| !p.is_terminal()) {
                    inner.progress.publish(id, progress);
                }
            }
            TransferEvent::Finished(outcome) => return outcome,
        }
    }
    TransferOutcome::Failed(TransferError::WorkerLost)
}

/// Commit or clean up, drop the bookkeeping entry, then notify observers.
async fn settle(inner: &Inner, request: &DownloadRequest, outcome: TransferOutcome) {
    let id = request.id;
    let event = match outcome {
        TransferOutcome::Done { bytes_written } => {
            let record = DownloadRecord::new(id, &request.destination, &request.file_name);
            inner.catalog.commit(record.clone()).await;
            inner.progress.publish(id, Progress::COMPLETE);
            tracing::info!(
                id,
                bytes = bytes_written,
                path = %request.destination.display(),
                "download completed"
            );
            DownloadEvent::Completed {
                record,
                bytes_written,
            }
        }
        TransferOutcome::Failed(error) => {
            tracing::warn!(id, url = %request.url, "download failed: {}", error);
            inner.progress.publish(id, Progress::Failed);
            DownloadEvent::Failed {
                id,
                error: Arc::new(error),
            }
        }
        TransferOutcome::Cancelled => {
            tracing::info!(id, "download cancelled");
            inner.progress.clear(id);
            DownloadEvent::Cancelled { id }
        }
    };

    inner.book().transfers.remove(&id);
    let _ = inner.events.send(event);
}
