//! Download manager: the single synchronization point for transfers.
//!
//! - at most one accepted transfer per id;
//! - at most `max_concurrent` transfers moving bytes; the rest wait FIFO,
//!   up to `max_queued`, after which `start` is rejected with `QueueFull`;
//! - completed transfers are committed to the catalog, everything else is
//!   cleaned up and leaves the id absent (no automatic retry).
//!
//! Per id: `Absent → Pending → InProgress → {Completed, Failed, Cancelled}`.
//! Only engine terminal events drive the last transition.

mod state;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogStore, DownloadId, DownloadRecord};
use crate::config::MdmConfig;
use crate::engine::{CurlEngine, TransferEngine, TransferError};
use crate::naming;
use crate::progress::{ProgressHub, ProgressSnapshot};

pub use state::{TransferPhase, TransferState};

use state::{ActiveTransfer, Bookkeeping};

/// One download request from the asset source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub id: DownloadId,
    /// Opaque to the manager.
    pub url: String,
    pub destination: PathBuf,
    /// Display name stored in the catalog.
    pub file_name: String,
}

impl DownloadRequest {
    pub fn new(
        id: DownloadId,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            destination: destination.into(),
            file_name: file_name.into(),
        }
    }

    /// Request with a namespaced destination (`video_{id}_{quality}.{ext}`) in `download_dir`.
    pub fn for_asset(download_dir: &Path, id: DownloadId, url: &str, quality: &str) -> Self {
        let destination = naming::destination_for(download_dir, id, quality, url);
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(id, url, destination, file_name)
    }
}

/// Why `start` refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartRejected {
    #[error("asset {0} is already downloaded")]
    AlreadyDownloaded(DownloadId),
    #[error("asset {0} is already being downloaded")]
    AlreadyInProgress(DownloadId),
    #[error("{} already belongs to asset {owner}", .path.display())]
    DestinationInUse { path: PathBuf, owner: DownloadId },
    #[error("download queue is full ({limit} transfers accepted)")]
    QueueFull { limit: usize },
    #[error("download manager is shutting down")]
    ShuttingDown,
}

/// Query on an id that has no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no download recorded for asset {0}")]
pub struct NotFound(pub DownloadId);

/// Terminal event of one transfer, broadcast to observers.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Completed {
        record: DownloadRecord,
        bytes_written: u64,
    },
    Failed {
        id: DownloadId,
        error: Arc<TransferError>,
    },
    Cancelled {
        id: DownloadId,
    },
}

impl DownloadEvent {
    pub fn id(&self) -> DownloadId {
        match self {
            DownloadEvent::Completed { record, .. } => record.id,
            DownloadEvent::Failed { id, .. } | DownloadEvent::Cancelled { id } => *id,
        }
    }
}

/// Concurrency ceiling and queue bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerLimits {
    pub max_concurrent: usize,
    pub max_queued: usize,
}

impl Default for ManagerLimits {
    fn default() -> Self {
        Self::from_config(&MdmConfig::default())
    }
}

impl ManagerLimits {
    pub fn from_config(cfg: &MdmConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent_transfers.max(1),
            max_queued: cfg.max_queued_transfers,
        }
    }

    /// Most transfers that may be accepted (running + queued) at once.
    pub fn capacity(&self) -> usize {
        self.max_concurrent.max(1) + self.max_queued
    }
}

/// Result of `shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Transfers that were running or queued when shutdown began.
    pub cancelled: usize,
    /// Of those, how many had not settled when the wait timed out.
    pub unfinished: usize,
}

const EVENT_CAPACITY: usize = 256;

pub(crate) struct Inner {
    engine: Arc<dyn TransferEngine>,
    catalog: CatalogStore,
    progress: ProgressHub,
    book: Mutex<Bookkeeping>,
    slots: Arc<Semaphore>,
    events: broadcast::Sender<DownloadEvent>,
    limits: ManagerLimits,
}

impl Inner {
    fn book(&self) -> MutexGuard<'_, Bookkeeping> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle; clones share one manager.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl DownloadManager {
    pub fn new(engine: Arc<dyn TransferEngine>, catalog: CatalogStore, limits: ManagerLimits) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                engine,
                catalog,
                progress: ProgressHub::new(),
                book: Mutex::new(Bookkeeping::default()),
                slots: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
                events,
                limits,
            }),
        }
    }

    /// Manager over the default on-disk catalog and the curl engine.
    pub async fn from_config(cfg: &MdmConfig) -> Result<Self> {
        let catalog = CatalogStore::open_default().await?;
        let engine = Arc::new(CurlEngine::from_config(cfg));
        Ok(Self::new(engine, catalog, ManagerLimits::from_config(cfg)))
    }

    pub fn limits(&self) -> ManagerLimits {
        self.inner.limits
    }

    /// Accept a download and return without waiting for it.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, request: DownloadRequest) -> Result<(), StartRejected> {
        let id = request.id;
        let (finished_tx, finished_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        {
            let mut book = self.inner.book();
            if book.shutting_down {
                return Err(StartRejected::ShuttingDown);
            }
            if self.inner.catalog.contains(id) {
                return Err(StartRejected::AlreadyDownloaded(id));
            }
            if book.transfers.contains_key(&id) {
                return Err(StartRejected::AlreadyInProgress(id));
            }
            let owner = book
                .destination_owner(&request.destination)
                .or_else(|| self.inner.catalog.owner_of(&request.destination));
            if let Some(owner) = owner {
                return Err(StartRejected::DestinationInUse {
                    path: request.destination.clone(),
                    owner,
                });
            }
            let limit = self.inner.limits.capacity();
            if book.transfers.len() >= limit {
                return Err(StartRejected::QueueFull { limit });
            }
            book.transfers.insert(
                id,
                ActiveTransfer {
                    state: TransferState::pending(id, request.destination.clone()),
                    cancel: cancel.clone(),
                    finished: finished_rx,
                },
            );
        }

        tracing::info!(
            id,
            url = %request.url,
            path = %request.destination.display(),
            "download accepted"
        );
        tokio::spawn(worker::run_transfer(
            Arc::clone(&self.inner),
            request,
            cancel,
            finished_tx,
        ));
        Ok(())
    }

    /// Raise the cancel signal of a queued or running transfer.
    /// Returns false (and does nothing) if `id` has none.
    pub fn cancel(&self, id: DownloadId) -> bool {
        self.cancel_and_watch(id).is_some()
    }

    fn cancel_and_watch(&self, id: DownloadId) -> Option<watch::Receiver<bool>> {
        let book = self.inner.book();
        let transfer = book.transfers.get(&id)?;
        transfer.cancel.cancel();
        tracing::debug!(id, "cancel requested");
        Some(transfer.finished.clone())
    }

    /// Wait until `id` has no accepted transfer. Returns immediately if it has none.
    pub async fn wait_until_settled(&self, id: DownloadId) {
        let finished = self.inner.book().transfers.get(&id).map(|t| t.finished.clone());
        if let Some(mut finished) = finished {
            let _ = finished.wait_for(|done| *done).await;
        }
    }

    pub fn is_downloaded(&self, id: DownloadId) -> bool {
        self.inner.catalog.contains(id)
    }

    /// Path recorded at commit time. The file may have been removed since.
    pub fn local_path(&self, id: DownloadId) -> Option<PathBuf> {
        self.inner.catalog.get(id).map(|r| r.local_path)
    }

    pub fn record(&self, id: DownloadId) -> Result<DownloadRecord, NotFound> {
        self.inner.catalog.get(id).ok_or(NotFound(id))
    }

    /// Cancel any transfer for `id` (waiting for it to settle), then delete the
    /// record and its file. Unknown ids are a no-op.
    pub async fn remove(&self, id: DownloadId) -> Option<DownloadRecord> {
        if let Some(mut finished) = self.cancel_and_watch(id) {
            let _ = finished.wait_for(|done| *done).await;
        }
        self.inner.catalog.remove(id).await
    }

    /// Every completed download, in no particular order.
    pub fn all_downloads(&self) -> Vec<DownloadRecord> {
        self.inner.catalog.all()
    }

    pub fn transfer_state(&self, id: DownloadId) -> Option<TransferState> {
        self.inner.book().transfers.get(&id).map(|t| t.state.clone())
    }

    pub fn is_active(&self, id: DownloadId) -> bool {
        self.inner.book().transfers.contains_key(&id)
    }

    /// Snapshot of all accepted transfers (pending and in progress).
    pub fn active_transfers(&self) -> Vec<TransferState> {
        self.inner
            .book()
            .transfers
            .values()
            .map(|t| t.state.clone())
            .collect()
    }

    /// Transfers currently holding a concurrency slot.
    pub fn in_progress_count(&self) -> usize {
        self.inner.book().in_progress_count()
    }

    pub fn progress(&self) -> &ProgressHub {
        &self.inner.progress
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.inner.progress.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DownloadEvent> {
        self.inner.events.subscribe()
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.inner.catalog
    }

    /// Reject new starts, cancel everything accepted, and wait up to `timeout`
    /// for those transfers to settle. Completed records are kept.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let waiters: Vec<watch::Receiver<bool>> = {
            let mut book = self.inner.book();
            book.shutting_down = true;
            book.transfers
                .values()
                .map(|t| {
                    t.cancel.cancel();
                    t.finished.clone()
                })
                .collect()
        };
        self.inner.slots.close();

        let cancelled = waiters.len();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut unfinished = 0;
        for mut finished in waiters {
            let settled = tokio::time::timeout_at(deadline, finished.wait_for(|done| *done))
                .await
                .is_ok();
            if !settled {
                unfinished += 1;
            }
        }
        self.inner.progress.clear_all();

        if unfinished > 0 {
            tracing::warn!(cancelled, unfinished, "shutdown timed out waiting for transfers");
        } else {
            tracing::info!(cancelled, "download manager shut down");
        }
        ShutdownReport {
            cancelled,
            unfinished,
        }
    }
}
