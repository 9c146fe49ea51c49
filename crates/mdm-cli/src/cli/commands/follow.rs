//! Wait for a set of accepted downloads, printing progress, with Ctrl-C shutdown.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use mdm_core::manager::{DownloadEvent, DownloadManager};
use mdm_core::progress::{Progress, ProgressSnapshot};
use mdm_core::DownloadId;
use tokio::sync::broadcast::{self, error::RecvError};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl Tally {
    fn record(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Completed { record, .. } => {
                self.completed += 1;
                println!("{}: done -> {}", record.id, record.local_path.display());
            }
            DownloadEvent::Failed { id, error } => {
                self.failed += 1;
                println!("{id}: failed: {error}");
            }
            DownloadEvent::Cancelled { id } => {
                self.cancelled += 1;
                println!("{id}: cancelled");
            }
        }
    }

    /// Error if anything did not complete.
    pub fn into_result(self) -> Result<()> {
        if self.failed > 0 || self.cancelled > 0 {
            bail!(
                "{} completed, {} failed, {} cancelled",
                self.completed,
                self.failed,
                self.cancelled
            );
        }
        Ok(())
    }
}

/// `events` must have been subscribed before the downloads were started.
pub async fn follow(
    manager: &DownloadManager,
    mut events: broadcast::Receiver<DownloadEvent>,
    ids: &[DownloadId],
    shutdown_timeout: Duration,
) -> Tally {
    let mut pending: BTreeSet<DownloadId> = ids.iter().copied().collect();
    let mut tally = Tally::default();
    let mut progress = manager.subscribe_progress();
    let mut last_print = Instant::now();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !pending.is_empty() {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("Interrupted; cancelling {} download(s)...", pending.len());
                let report = manager.shutdown(shutdown_timeout).await;
                while let Ok(event) = events.try_recv() {
                    if pending.remove(&event.id()) {
                        tally.record(&event);
                    }
                }
                tally.cancelled += pending.len();
                if report.unfinished > 0 {
                    eprintln!("{} transfer(s) did not stop in time", report.unfinished);
                }
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if pending.remove(&event.id()) {
                        tally.record(&event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; resyncing from manager state");
                    resync(manager, &mut pending, &mut tally);
                }
                Err(RecvError::Closed) => break,
            },
            changed = progress.changed() => {
                if changed.is_err() {
                    continue;
                }
                if last_print.elapsed() >= PROGRESS_INTERVAL {
                    let snapshot = progress.borrow_and_update().clone();
                    print_progress(&snapshot, &pending);
                    last_print = Instant::now();
                }
            }
        }
    }
    tally
}

/// Settle ids whose terminal event was lost to lag.
fn resync(manager: &DownloadManager, pending: &mut BTreeSet<DownloadId>, tally: &mut Tally) {
    pending.retain(|&id| {
        if manager.is_active(id) {
            return true;
        }
        if manager.is_downloaded(id) {
            tally.completed += 1;
        } else {
            tally.failed += 1;
        }
        false
    });
}

fn print_progress(snapshot: &ProgressSnapshot, pending: &BTreeSet<DownloadId>) {
    for id in pending {
        match snapshot.get(id) {
            Some(Progress::Percent(pct)) => println!("{id}: {pct:5.1}%"),
            Some(Progress::Indeterminate) => println!("{id}: downloading (size unknown)"),
            Some(Progress::Failed) | None => {}
        }
    }
}
