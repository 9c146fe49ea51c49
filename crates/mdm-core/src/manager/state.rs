//! Bookkeeping for accepted transfers, guarded by the manager's single lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::DownloadId;
use crate::progress::Progress;

/// Where an accepted transfer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Accepted, waiting for a concurrency slot.
    Pending,
    /// Holding a slot; bytes are moving.
    InProgress,
}

/// Ephemeral view of one accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferState {
    pub id: DownloadId,
    pub phase: TransferPhase,
    pub destination: PathBuf,
    pub bytes_total: Option<u64>,
    pub bytes_transferred: u64,
    pub accepted_at: Instant,
    /// Set when the transfer leaves `Pending`.
    pub started_at: Option<Instant>,
}

impl TransferState {
    pub(super) fn pending(id: DownloadId, destination: PathBuf) -> Self {
        Self {
            id,
            phase: TransferPhase::Pending,
            destination,
            bytes_total: None,
            bytes_transferred: 0,
            accepted_at: Instant::now(),
            started_at: None,
        }
    }

    /// `None` when the total size is unknown.
    pub fn progress_percent(&self) -> Option<f32> {
        self.progress().percent()
    }

    pub fn progress(&self) -> Progress {
        Progress::from_bytes(self.bytes_transferred, self.bytes_total)
    }
}

pub(super) struct ActiveTransfer {
    pub(super) state: TransferState,
    pub(super) cancel: CancellationToken,
    /// Flips to `true` once the transfer left the bookkeeping map.
    pub(super) finished: watch::Receiver<bool>,
}

#[derive(Default)]
pub(super) struct Bookkeeping {
    pub(super) transfers: HashMap<DownloadId, ActiveTransfer>,
    pub(super) shutting_down: bool,
}

impl Bookkeeping {
    pub(super) fn in_progress_count(&self) -> usize {
        self.transfers
            .values()
            .filter(|t| t.state.phase == TransferPhase::InProgress)
            .count()
    }

    /// Id of the accepted transfer writing to `destination`, if any.
    pub(super) fn destination_owner(&self, destination: &Path) -> Option<DownloadId> {
        self.transfers
            .values()
            .find(|t| t.state.destination.as_path() == destination)
            .map(|t| t.state.id)
    }

    pub(super) fn mark_in_progress(&mut self, id: DownloadId) {
        if let Some(t) = self.transfers.get_mut(&id) {
            t.state.phase = TransferPhase::InProgress;
            t.state.started_at = Some(Instant::now());
        }
    }

    /// Apply a progress report. Byte counts never move backwards.
    pub(super) fn record_progress(
        &mut self,
        id: DownloadId,
        bytes_transferred: u64,
        bytes_total: Option<u64>,
    ) -> Option<Progress> {
        let t = self.transfers.get_mut(&id)?;
        t.state.bytes_transferred = t.state.bytes_transferred.max(bytes_transferred);
        if bytes_total.is_some() {
            t.state.bytes_total = bytes_total;
        }
        Some(t.state.progress())
    }
}
