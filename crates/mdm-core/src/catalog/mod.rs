//! Catalog store: durable id → completed-download record mapping.
//!
//! The whole catalog is one JSON blob under a well-known key in the local
//! key-value table. It is loaded once at startup and rewritten in full after
//! every mutation. The in-memory map is authoritative for the running
//! process; a failed write is logged, not rolled back.

mod kv;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use kv::KvStore;

/// Caller-supplied stable key of a downloadable asset.
pub type DownloadId = i64;

/// Key the serialized catalog is stored under.
pub const CATALOG_KEY: &str = "downloaded_videos";

/// One completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub local_path: PathBuf,
    pub file_name: String,
    /// Epoch milliseconds at commit time.
    pub downloaded_at: i64,
}

impl DownloadRecord {
    /// Record stamped with the current time.
    pub fn new(id: DownloadId, local_path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            id,
            local_path: local_path.into(),
            file_name: file_name.into(),
            downloaded_at: kv::unix_millis(),
        }
    }
}

/// The full set of records.
pub type Catalog = HashMap<DownloadId, DownloadRecord>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog storage: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("corrupt catalog: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub fn encode_catalog(catalog: &Catalog) -> Result<String, serde_json::Error> {
    serde_json::to_string(catalog)
}

pub fn decode_catalog(blob: &str) -> Result<Catalog, serde_json::Error> {
    serde_json::from_str(blob)
}

/// Read the persisted catalog. A missing blob is an empty catalog.
pub async fn load_catalog(kv: &KvStore) -> Result<Catalog, CatalogError> {
    match kv.get(CATALOG_KEY).await? {
        Some(blob) => Ok(decode_catalog(&blob)?),
        None => Ok(Catalog::new()),
    }
}

struct StoreInner {
    kv: KvStore,
    records: RwLock<Catalog>,
    // Serializes mutate+persist so the last write always carries the latest map.
    write_lock: tokio::sync::Mutex<()>,
}

/// Owner of the catalog. Clones share state; callers only ever get copies of records.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<StoreInner>,
}

impl CatalogStore {
    /// Load from `kv`. Unreadable or corrupt data yields an empty catalog.
    pub async fn load(kv: KvStore) -> Self {
        let records = match load_catalog(&kv).await {
            Ok(catalog) => {
                tracing::debug!(count = catalog.len(), "loaded download catalog");
                catalog
            }
            Err(e) => {
                tracing::warn!("starting with empty catalog: {}", e);
                Catalog::new()
            }
        };
        Self {
            inner: Arc::new(StoreInner {
                kv,
                records: RwLock::new(records),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub async fn open_default() -> Result<Self> {
        Ok(Self::load(KvStore::open_default().await?).await)
    }

    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::load(KvStore::open_at(path).await?).await)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Catalog> {
        self.inner.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Catalog> {
        self.inner.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: DownloadId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn get(&self, id: DownloadId) -> Option<DownloadRecord> {
        self.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Id of the record whose file is `path`, if any.
    pub fn owner_of(&self, path: &Path) -> Option<DownloadId> {
        self.read()
            .values()
            .find(|r| r.local_path.as_path() == path)
            .map(|r| r.id)
    }

    /// Snapshot of every record, in no particular order.
    pub fn all(&self) -> Vec<DownloadRecord> {
        self.read().values().cloned().collect()
    }

    /// Insert or replace the record for `record.id`, then persist.
    pub async fn commit(&self, record: DownloadRecord) {
        let _guard = self.inner.write_lock.lock().await;
        let id = record.id;
        self.write().insert(id, record);
        tracing::info!(id, "catalog commit");
        self.persist_locked().await;
    }

    /// Delete the record's file (if still present), drop the entry, persist.
    /// Unknown ids are a no-op and do not touch storage.
    pub async fn remove(&self, id: DownloadId) -> Option<DownloadRecord> {
        let _guard = self.inner.write_lock.lock().await;
        let local_path = self.read().get(&id).map(|r| r.local_path.clone())?;

        match tokio::fs::remove_file(&local_path).await {
            Ok(()) => tracing::debug!(path = %local_path.display(), "deleted downloaded file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %local_path.display(), "could not delete downloaded file: {}", e)
            }
        }

        let previous = self.write().remove(&id);
        tracing::info!(id, "catalog remove");
        self.persist_locked().await;
        previous
    }

    /// Re-serialize the whole catalog. Caller holds `write_lock`.
    async fn persist_locked(&self) {
        let blob = match encode_catalog(&self.read()) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::error!("could not serialize catalog: {}", e);
                return;
            }
        };
        if let Err(e) = self.inner.kv.put(CATALOG_KEY, &blob).await {
            tracing::warn!("catalog persistence failed (in-memory state kept): {}", e);
        }
    }
}
