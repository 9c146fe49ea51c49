//! Progress hub: in-memory id → progress map broadcast to observers.
//!
//! Backed by a `watch` channel, so observers always see the latest snapshot
//! and rapid updates coalesce. Terminal values (complete or failed) are
//! cleared right after being published; only in-flight ids stay visible.
//! Nothing here is persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::catalog::DownloadId;

/// Progress of one in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Percentage in `0.0..=100.0`.
    Percent(f32),
    /// Server sent no Content-Length.
    Indeterminate,
    /// Error sentinel published when a transfer fails.
    Failed,
}

impl Progress {
    pub const COMPLETE: Progress = Progress::Percent(100.0);

    /// Derive progress from byte counts.
    pub fn from_bytes(transferred: u64, total: Option<u64>) -> Self {
        match total {
            Some(0) => Progress::COMPLETE,
            Some(total) => {
                let pct = transferred as f64 / total as f64 * 100.0;
                Progress::Percent(pct.clamp(0.0, 100.0) as f32)
            }
            None => Progress::Indeterminate,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Progress::Percent(p) => *p >= 100.0,
            Progress::Indeterminate => false,
            Progress::Failed => true,
        }
    }

    pub fn percent(&self) -> Option<f32> {
        match self {
            Progress::Percent(p) => Some(*p),
            _ => None,
        }
    }
}

/// Snapshot delivered to subscribers.
pub type ProgressSnapshot = BTreeMap<DownloadId, Progress>;

/// Cloneable handle; all clones share one map.
#[derive(Clone)]
pub struct ProgressHub {
    tx: Arc<watch::Sender<ProgressSnapshot>>,
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressSnapshot::new());
        Self { tx: Arc::new(tx) }
    }

    /// Record progress for `id`. Terminal values are immediately cleared.
    pub fn publish(&self, id: DownloadId, progress: Progress) {
        self.tx.send_modify(|map| {
            map.insert(id, progress);
        });
        if progress.is_terminal() {
            self.clear(id);
        }
    }

    /// Drop `id` from the in-progress view.
    pub fn clear(&self, id: DownloadId) {
        self.tx.send_if_modified(|map| map.remove(&id).is_some());
    }

    /// Drop every id (used on shutdown).
    pub fn clear_all(&self) {
        self.tx.send_if_modified(|map| {
            let had_entries = !map.is_empty();
            map.clear();
            had_entries
        });
    }

    /// Stream of snapshots; the receiver starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: DownloadId) -> Option<Progress> {
        self.tx.borrow().get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_percent_and_indeterminate() {
        assert_eq!(Progress::from_bytes(250, Some(1000)), Progress::Percent(25.0));
        assert_eq!(Progress::from_bytes(10, None), Progress::Indeterminate);
        assert_eq!(Progress::from_bytes(0, Some(0)), Progress::COMPLETE);
        assert_eq!(Progress::from_bytes(2000, Some(1000)), Progress::COMPLETE);
    }

    #[test]
    fn terminal_values() {
        assert!(Progress::COMPLETE.is_terminal());
        assert!(Progress::Failed.is_terminal());
        assert!(!Progress::Percent(99.9).is_terminal());
        assert!(!Progress::Indeterminate.is_terminal());
        assert_eq!(Progress::Failed.percent(), None);
    }

    #[test]
    fn publish_and_clear() {
        let hub = ProgressHub::new();
        hub.publish(7, Progress::Percent(40.0));
        hub.publish(8, Progress::Indeterminate);
        assert_eq!(hub.get(7), Some(Progress::Percent(40.0)));
        assert_eq!(hub.snapshot().len(), 2);
        hub.clear(8);
        assert_eq!(hub.get(8), None);
        hub.clear(8);
        assert_eq!(hub.snapshot().len(), 1);
    }

    #[test]
    fn terminal_publish_does_not_linger() {
        let hub = ProgressHub::new();
        hub.publish(7, Progress::Percent(50.0));
        hub.publish(7, Progress::COMPLETE);
        assert_eq!(hub.get(7), None);
        hub.publish(9, Progress::Percent(10.0));
        hub.publish(9, Progress::Failed);
        assert!(hub.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_latest_state() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe();
        for pct in [10.0, 20.0, 30.0] {
            hub.publish(1, Progress::Percent(pct));
        }
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().get(&1), Some(&Progress::Percent(30.0)));

        hub.clear_all();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }
}
