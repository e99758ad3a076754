use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

/// Storage partitions, mirroring the two capacity classes of the host
/// key-value API: a large per-video area and a small synced settings area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Local,
    Sync,
}

impl Partition {
    fn table(self) -> &'static str {
        match self {
            Partition::Local => "kv_local",
            Partition::Sync => "kv_sync",
        }
    }
}

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store thread: {join_err:?}");
            }
        }
    }
}

enum Location {
    Disk(PathBuf),
    Memory,
}

/// Asynchronous key-value store backed by SQLite on a dedicated worker
/// thread. Callers submit closures and await their result; the connection
/// itself never leaves the worker.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
    path: Option<Arc<PathBuf>>,
}

impl Store {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory {}", parent.display())
            })?;
        }
        Self::spawn(Location::Disk(db_path))
    }

    /// In-memory store, used by tests and throwaway sessions.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(Location::Memory)
    }

    fn spawn(location: Location) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let path = match &location {
            Location::Disk(path) => Some(Arc::new(path.clone())),
            Location::Memory => None,
        };

        let worker = thread::Builder::new()
            .name("vidmark-store".into())
            .spawn(move || {
                let opened = match &location {
                    Location::Disk(path) => Connection::open(path),
                    Location::Memory => Connection::open_in_memory(),
                };
                let mut conn = match opened {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite store")));
                        return;
                    }
                };

                if matches!(location, Location::Disk(_)) {
                    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                        error!("Failed to enable WAL mode: {err}");
                    }
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        if let Some(path) = &path {
            info!("Store initialized at {}", path.as_path().display());
        }

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(|p| p.as_path())
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    /// Fetches the raw JSON value for a key, or `None` when absent. A stored
    /// value that fails to parse as JSON is treated as absent so that callers
    /// always see either valid data or their default.
    pub async fn get(&self, partition: Partition, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        let raw: Option<String> = self
            .execute(move |conn| {
                let sql = format!("SELECT value FROM {} WHERE key = ?1", partition.table());
                conn.query_row(&sql, params![key], |row| row.get(0))
                    .optional()
                    .with_context(|| format!("failed to read key from {}", partition.table()))
            })
            .await?;

        match raw {
            Some(text) => match serde_json::from_str(&text) {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    warn!("Discarding malformed stored value: {err}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set(&self, partition: Partition, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        let text = serde_json::to_string(&value).context("failed to serialize value")?;
        self.execute(move |conn| {
            let sql = format!(
                "INSERT INTO {table} (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                table = partition.table()
            );
            conn.execute(&sql, params![key, text, Utc::now().to_rfc3339()])
                .with_context(|| format!("failed to write key to {}", partition.table()))?;
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, partition: Partition, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            let sql = format!("DELETE FROM {} WHERE key = ?1", partition.table());
            conn.execute(&sql, params![key])
                .with_context(|| format!("failed to delete key from {}", partition.table()))?;
            Ok(())
        })
        .await
    }

    /// Typed read: absent, malformed JSON, or a value of the wrong shape all
    /// decode to `None`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get(partition, key).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(decoded) => Ok(Some(decoded)),
                Err(err) => {
                    warn!("Stored value for '{key}' has unexpected shape: {err}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(value).context("failed to serialize value")?;
        self.set(partition, key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_missing_key() {
        let store = Store::in_memory().unwrap();
        let value = store.get(Partition::Local, "bm_missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = Store::in_memory().unwrap();
        store
            .set(Partition::Sync, "speed", serde_json::json!(1.75))
            .await
            .unwrap();
        let value = store.get(Partition::Sync, "speed").await.unwrap();
        assert_eq!(value, Some(serde_json::json!(1.75)));
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let store = Store::in_memory().unwrap();
        store
            .set(Partition::Sync, "skipAds", serde_json::json!(false))
            .await
            .unwrap();
        store
            .set(Partition::Sync, "skipAds", serde_json::json!(true))
            .await
            .unwrap();
        let value = store.get(Partition::Sync, "skipAds").await.unwrap();
        assert_eq!(value, Some(serde_json::json!(true)));
    }

    #[tokio::test]
    async fn remove_deletes_the_key_outright() {
        let store = Store::in_memory().unwrap();
        store
            .set(Partition::Local, "bm_abc", serde_json::json!([1, 2, 3]))
            .await
            .unwrap();
        store.remove(Partition::Local, "bm_abc").await.unwrap();
        assert!(store.get(Partition::Local, "bm_abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partitions_do_not_share_keys() {
        let store = Store::in_memory().unwrap();
        store
            .set(Partition::Local, "speed", serde_json::json!(2.0))
            .await
            .unwrap();
        assert!(store.get(Partition::Sync, "speed").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn typed_read_with_wrong_shape_decodes_to_none() {
        let store = Store::in_memory().unwrap();
        store
            .set(Partition::Sync, "speed", serde_json::json!("not a number"))
            .await
            .unwrap();
        let value: Option<f64> = store.get_json(Partition::Sync, "speed").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidmark.db");

        {
            let store = Store::open(path.clone()).unwrap();
            store
                .set(Partition::Local, "bm_abc123", serde_json::json!([{"time": 10}]))
                .await
                .unwrap();
        }

        let store = Store::open(path).unwrap();
        let value = store.get(Partition::Local, "bm_abc123").await.unwrap();
        assert_eq!(value, Some(serde_json::json!([{"time": 10}])));
    }
}
