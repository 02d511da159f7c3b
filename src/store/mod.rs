//! The local record store: one lazily opened engine connection shared by every caller.

mod connection;

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, error, info, warn};

use crate::dao::{
    engine::{DatabaseDescriptor, EngineConnector, RecordEngine},
    record::{Record, RecordId},
    storage::{StorageError, StorageResult},
};

pub use self::connection::{AlreadySettled, ConnectionStatus};
use self::connection::Connection;

/// Shared handle to a [`LocalRecordStore`].
pub type SharedStore = Arc<LocalRecordStore>;

static GLOBAL_STORE: OnceLock<SharedStore> = OnceLock::new();

/// Asynchronous CRUD adapter over a single engine connection.
///
/// The store starts out `Connecting`. [`LocalRecordStore::initialize`] opens
/// the engine once; afterwards the status never changes again.
pub struct LocalRecordStore {
    connection: RwLock<Connection>,
    status: watch::Sender<ConnectionStatus>,
    init_gate: Mutex<()>,
}

impl LocalRecordStore {
    /// Construct a store that is still waiting for its connection.
    pub fn new() -> SharedStore {
        let (status, _rx) = watch::channel(ConnectionStatus::Connecting);
        Arc::new(Self {
            connection: RwLock::new(Connection::Connecting),
            status,
            init_gate: Mutex::new(()),
        })
    }

    /// Process-wide store, created on first use.
    pub fn global() -> SharedStore {
        Arc::clone(GLOBAL_STORE.get_or_init(LocalRecordStore::new))
    }

    /// Open the database through `connector` unless the store already settled.
    ///
    /// Concurrent callers wait for the attempt in flight. Failures are logged
    /// and leave the store `Failed`; nothing is retried.
    pub async fn initialize(
        &self,
        connector: &dyn EngineConnector,
        descriptor: DatabaseDescriptor,
    ) -> ConnectionStatus {
        let _gate = self.init_gate.lock().await;

        {
            let guard = self.connection.read().await;
            let status = guard.status();
            if status.is_settled() {
                if let Some(existing) = guard.descriptor() {
                    if existing.table_set() != descriptor.table_set() {
                        warn!(
                            database = %existing.name,
                            opened = ?existing.tables,
                            requested = ?descriptor.tables,
                            "record store already initialized; ignoring requested tables"
                        );
                    }
                }
                debug!(%status, "record store already initialized; skipping");
                return status;
            }
        }

        info!(
            database = %descriptor.name,
            version = descriptor.version,
            tables = ?descriptor.tables,
            "opening record store"
        );
        let outcome = connector.connect(descriptor.clone()).await;
        match &outcome {
            Ok(_) => info!(database = %descriptor.name, "record store ready"),
            Err(err) => error!(
                database = %descriptor.name,
                error = %err,
                "error initializing record store"
            ),
        }

        let status = {
            let mut guard = self.connection.write().await;
            match guard.settle(descriptor, outcome) {
                Ok(status) => status,
                Err(err) => {
                    warn!(error = %err, "record store settled concurrently");
                    err.current
                }
            }
        };
        self.status.send_replace(status);
        status
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// `true` until the open attempt settled.
    pub fn is_connecting(&self) -> bool {
        self.status() == ConnectionStatus::Connecting
    }

    /// Subscribe to status changes.
    pub fn status_watcher(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Wait until the store is `Ready` or `Failed`.
    pub async fn wait_until_settled(&self) -> ConnectionStatus {
        let mut watcher = self.status.subscribe();
        match watcher.wait_for(|status| status.is_settled()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Descriptor the connection was opened with, once settled.
    pub async fn descriptor(&self) -> Option<DatabaseDescriptor> {
        self.connection.read().await.descriptor().cloned()
    }

    /// Error message of a failed open attempt.
    pub async fn failure_reason(&self) -> Option<String> {
        self.connection
            .read()
            .await
            .failure_reason()
            .map(str::to_owned)
    }

    /// Tables present in the opened database.
    pub async fn tables(&self) -> StorageResult<Vec<String>> {
        self.engine().await?.tables().await
    }

    async fn engine(&self) -> StorageResult<Arc<dyn RecordEngine>> {
        let guard = self.connection.read().await;
        guard.engine().ok_or(StorageError::Uninitialized {
            status: guard.status(),
        })
    }

    /// Fetch one record; `None` when no record has this id.
    pub async fn get_one(&self, table: &str, id: RecordId) -> StorageResult<Option<Record>> {
        self.engine().await?.get(table, id).await
    }

    /// Fetch every record of a table, in ascending key order.
    pub async fn get_all(&self, table: &str) -> StorageResult<Vec<Record>> {
        self.engine().await?.get_all(table).await
    }

    /// Insert a record without `id`, or replace the record stored at its `id`.
    pub async fn put(&self, table: &str, record: Record) -> StorageResult<RecordId> {
        self.engine().await?.put(table, record).await
    }

    /// Write every record in one transaction, then return the whole table.
    pub async fn put_bulk(&self, table: &str, records: Vec<Record>) -> StorageResult<Vec<Record>> {
        let engine = self.engine().await?;
        let written = engine.put_many(table, records).await?;
        debug!(table, count = written.len(), "bulk put committed");
        engine.get_all(table).await
    }

    /// Shallow-merge `partial` over the record stored at `id` and write it back.
    ///
    /// A missing record is written as `{id, newItem: partial}`.
    pub async fn update(&self, table: &str, id: RecordId, partial: Record) -> StorageResult<Record> {
        let result = match self.engine().await {
            Ok(engine) => engine.update(table, id, partial).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(table, %id, error = %err, "update value failed");
        }
        result
    }

    /// Remove the record at `id` once the engine acknowledged it.
    ///
    /// Removing an id that does not exist succeeds.
    pub async fn delete_one(&self, table: &str, id: RecordId) -> StorageResult<RecordId> {
        let result = match self.engine().await {
            Ok(engine) => engine.delete(table, id).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(existed) => {
                debug!(table, %id, existed, "record deleted");
                Ok(id)
            }
            Err(err) => {
                warn!(table, %id, error = %err, "delete value failed");
                Err(err)
            }
        }
    }

    /// Remove every record of a table.
    pub async fn delete_all(&self, table: &str) -> StorageResult<()> {
        let result = match self.engine().await {
            Ok(engine) => engine.clear(table).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(removed) => {
                debug!(table, removed, "table cleared");
                Ok(())
            }
            Err(err) => {
                warn!(table, error = %err, "delete all values failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::dao::engine::memory::MemoryProfile;

    fn object(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn descriptor() -> DatabaseDescriptor {
        DatabaseDescriptor::new("mystery-box", 1).with_table("games")
    }

    #[tokio::test]
    async fn operations_fail_before_initialization() {
        let store = LocalRecordStore::new();
        assert!(store.is_connecting());

        let err = store.get_all("games").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Uninitialized {
                status: ConnectionStatus::Connecting
            }
        ));
        assert!(store.delete_one("games", RecordId::new(1)).await.is_err());
        assert!(store.delete_all("games").await.is_err());
    }

    #[tokio::test]
    async fn failed_initialization_is_terminal() {
        let store = LocalRecordStore::new();
        let profile = MemoryProfile::new();

        let status = store
            .initialize(&profile, DatabaseDescriptor::new("bad name", 1))
            .await;
        assert_eq!(status, ConnectionStatus::Failed);
        assert!(store.failure_reason().await.is_some());

        let retry = store.initialize(&profile, descriptor()).await;
        assert_eq!(retry, ConnectionStatus::Failed);

        let err = store.get_one("games", RecordId::new(1)).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Uninitialized {
                status: ConnectionStatus::Failed
            }
        ));
    }

    #[tokio::test]
    async fn second_initialization_keeps_the_first_connection() {
        let store = LocalRecordStore::new();
        let profile = MemoryProfile::new();

        store.initialize(&profile, descriptor()).await;
        let status = store
            .initialize(
                &profile,
                DatabaseDescriptor::new("mystery-box", 2).with_tables(["games", "players"]),
            )
            .await;

        assert_eq!(status, ConnectionStatus::Ready);
        assert_eq!(store.descriptor().await, Some(descriptor()));
        assert_eq!(store.tables().await.unwrap(), vec!["games".to_string()]);
        assert_eq!(profile.version_of("mystery-box").await, Some(1));
    }

    #[tokio::test]
    async fn waiters_observe_the_settled_status() {
        let store = LocalRecordStore::new();
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.wait_until_settled().await })
        };

        store.initialize(&MemoryProfile::new(), descriptor()).await;

        assert_eq!(waiter.await.unwrap(), ConnectionStatus::Ready);
        assert!(!store.is_connecting());
    }

    #[tokio::test]
    async fn put_bulk_returns_the_whole_table() {
        let store = LocalRecordStore::new();
        store.initialize(&MemoryProfile::new(), descriptor()).await;
        store
            .put("games", object(json!({"name": "existing"})))
            .await
            .unwrap();

        let all = store
            .put_bulk(
                "games",
                vec![object(json!({"name": "a"})), object(json!({"name": "b"}))],
            )
            .await
            .unwrap();

        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn update_on_unknown_table_reports_the_error() {
        let store = LocalRecordStore::new();
        store.initialize(&MemoryProfile::new(), descriptor()).await;

        let err = store
            .update("players", RecordId::new(1), object(json!({"name": "x"})))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::UnknownTable { .. }));
    }
}
