//! SQLite-backed key-value table holding serialized blobs.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Handle to the local key-value store.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/mdm/catalog.db` on Debian.
#[derive(Clone)]
pub struct KvStore {
    pool: Pool<Sqlite>,
}

impl KvStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mdm")?;
        let path = xdg_dirs.get_state_home().join("catalog.db");
        Self::open_at(path).await
    }

    /// Open (or create) the store at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let kv = KvStore { pool };
        kv.migrate().await?;
        Ok(kv)
    }

    /// In-memory store (no disk I/O); contents vanish with the handle.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let kv = KvStore { pool };
        kv.migrate().await?;
        Ok(kv)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Insert or replace the blob stored under `key`.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(unix_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close the pool; later reads and writes fail.
    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_replace() {
        let kv = KvStore::open_in_memory().await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
        kv.put("k", "one").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("one"));
        kv.put("k", "two").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn closed_store_rejects_writes() {
        let kv = KvStore::open_in_memory().await.unwrap();
        kv.close().await;
        assert!(kv.put("k", "v").await.is_err());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my state #1/catalog.db");
        {
            let kv = KvStore::open_at(&path).await.unwrap();
            kv.put("k", "persisted").await.unwrap();
        }
        let kv = KvStore::open_at(&path).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("persisted"));
    }
}
