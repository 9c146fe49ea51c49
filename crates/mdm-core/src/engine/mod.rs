//! Transfer engine: one HTTP GET streamed to one local file.
//!
//! The engine knows nothing about the catalog or progress hub. It reports
//! byte progress through a callback and finishes with exactly one terminal
//! outcome (`Done`, `Failed` or `Cancelled`). Partial output is deleted on
//! every non-`Done` path.

mod curl_engine;
mod error;
mod head;
mod part;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use curl_engine::CurlEngine;
pub use error::TransferError;
pub use part::{part_path, PartFile, PART_SUFFIX};

/// What to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub destination: PathBuf,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, destination: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            destination: destination.as_ref().to_path_buf(),
        }
    }
}

/// Byte progress after one chunk. `bytes_total` is `None` when the server sent no length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub bytes_total: Option<u64>,
}

/// Terminal result of one fetch.
#[derive(Debug)]
pub enum TransferOutcome {
    Done { bytes_written: u64 },
    Failed(TransferError),
    Cancelled,
}

/// Items of a transfer's event stream; `Finished` is always last.
#[derive(Debug)]
pub enum TransferEvent {
    Progress(TransferProgress),
    Finished(TransferOutcome),
}

/// A swappable transport. Implementations block the calling thread.
///
/// Contract:
/// - create parent directories of the destination;
/// - call `on_progress` after every chunk, with non-decreasing byte counts;
/// - check `cancel` at chunk boundaries and return `Cancelled` once it is raised;
/// - leave no file at the destination (or its `.part`) unless returning `Done`.
pub trait TransferEngine: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> TransferOutcome;
}

/// Event stream of an in-flight fetch. Cancel through the token given to `spawn_fetch`.
pub struct TransferHandle {
    events: mpsc::UnboundedReceiver<TransferEvent>,
}

impl TransferHandle {
    /// Next event; `None` after `Finished`, or if the worker died without reporting.
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Drain progress and return the terminal outcome.
    pub async fn wait(mut self) -> TransferOutcome {
        while let Some(ev) = self.events.recv().await {
            if let TransferEvent::Finished(outcome) = ev {
                return outcome;
            }
        }
        TransferOutcome::Failed(TransferError::WorkerLost)
    }
}

/// Run `engine.fetch` on the blocking pool and expose it as an event stream.
pub fn spawn_fetch(
    engine: Arc<dyn TransferEngine>,
    request: FetchRequest,
    cancel: CancellationToken,
) -> TransferHandle {
    let (tx, events) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        let progress_tx = tx.clone();
        let outcome = engine.fetch(&request, &cancel, &mut |p| {
            let _ = progress_tx.send(TransferEvent::Progress(p));
        });
        let _ = tx.send(TransferEvent::Finished(outcome));
    });
    TransferHandle { events }
}
