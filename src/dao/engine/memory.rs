//! In-process engine: a profile of named databases living as long as the profile handle.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::info;

use super::{DatabaseDescriptor, EngineConnector, RecordEngine};
use crate::dao::{
    record::{MAX_KEY, Record, RecordId, merge_patch, record_key, with_key},
    storage::{StorageError, StorageResult},
};

/// Set of in-memory databases shared by every engine opened from it.
///
/// Cloning is cheap and clones see the same databases, so reopening a
/// database from the same profile sees what was written before.
#[derive(Clone, Default)]
pub struct MemoryProfile {
    databases: Arc<Mutex<HashMap<String, MemoryDatabase>>>,
}

#[derive(Default)]
struct MemoryDatabase {
    version: u32,
    tables: BTreeMap<String, MemoryTable>,
}

#[derive(Clone)]
struct MemoryTable {
    records: BTreeMap<RecordId, Record>,
    next_key: u64,
}

impl MemoryTable {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_key: 1,
        }
    }

    fn put(&mut self, table: &str, record: Record) -> StorageResult<RecordId> {
        let id = match record_key(table, &record)? {
            Some(id) => {
                if id.get() >= self.next_key {
                    self.next_key = id.get() + 1;
                }
                id
            }
            None => {
                if self.next_key > MAX_KEY {
                    return Err(StorageError::InvalidKey {
                        table: table.to_owned(),
                        reason: "key generator exhausted".into(),
                    });
                }
                let id = RecordId::new(self.next_key);
                self.next_key += 1;
                id
            }
        };

        self.records.insert(id, with_key(record, id));
        Ok(id)
    }
}

impl MemoryProfile {
    /// Create an empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored version of a database, `None` when it was never opened.
    pub async fn version_of(&self, database: &str) -> Option<u32> {
        let databases = self.databases.lock().await;
        databases.get(database).map(|db| db.version)
    }

    /// Names of every database opened from this profile.
    pub async fn database_names(&self) -> Vec<String> {
        let databases = self.databases.lock().await;
        let mut names = databases.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl EngineConnector for MemoryProfile {
    fn connect(
        &self,
        descriptor: DatabaseDescriptor,
    ) -> BoxFuture<'static, StorageResult<Arc<dyn RecordEngine>>> {
        let profile = self.clone();
        Box::pin(async move {
            descriptor.validate()?;

            let mut databases = profile.databases.lock().await;
            let database = databases.entry(descriptor.name.clone()).or_default();

            if database.version > descriptor.version {
                return Err(StorageError::VersionConflict {
                    database: descriptor.name,
                    stored: database.version,
                    requested: descriptor.version,
                });
            }

            if database.version < descriptor.version {
                info!(
                    database = %descriptor.name,
                    from = database.version,
                    to = descriptor.version,
                    "upgrading in-memory database"
                );
                for table in &descriptor.tables {
                    database
                        .tables
                        .entry(table.clone())
                        .or_insert_with(MemoryTable::new);
                }
                database.version = descriptor.version;
            }
            drop(databases);

            let engine: Arc<dyn RecordEngine> = Arc::new(MemoryEngine {
                profile,
                database: Arc::from(descriptor.name),
            });
            Ok(engine)
        })
    }
}

/// Engine over one database of a [`MemoryProfile`].
#[derive(Clone)]
pub struct MemoryEngine {
    profile: MemoryProfile,
    database: Arc<str>,
}

impl MemoryEngine {
    /// Run `work` against one table while holding the profile lock.
    async fn with_table<T, F>(&self, table: &str, work: F) -> StorageResult<T>
    where
        F: FnOnce(&mut MemoryTable) -> StorageResult<T>,
    {
        let mut databases = self.profile.databases.lock().await;
        let entry = databases
            .get_mut(self.database.as_ref())
            .and_then(|database| database.tables.get_mut(table))
            .ok_or_else(|| StorageError::unknown_table(table))?;
        work(entry)
    }
}

impl RecordEngine for MemoryEngine {
    fn get(&self, table: &str, id: RecordId) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| Ok(entry.records.get(&id).cloned()))
                .await
        })
    }

    fn get_all(&self, table: &str) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| Ok(entry.records.values().cloned().collect()))
                .await
        })
    }

    fn put(&self, table: &str, record: Record) -> BoxFuture<'static, StorageResult<RecordId>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| entry.put(&table, record))
                .await
        })
    }

    fn put_many(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> BoxFuture<'static, StorageResult<Vec<RecordId>>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| {
                    let mut staged = entry.clone();
                    let ids = records
                        .into_iter()
                        .map(|record| staged.put(&table, record))
                        .collect::<StorageResult<Vec<_>>>()?;
                    *entry = staged;
                    Ok(ids)
                })
                .await
        })
    }

    fn update(
        &self,
        table: &str,
        id: RecordId,
        patch: Record,
    ) -> BoxFuture<'static, StorageResult<Record>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| {
                    let merged = merge_patch(entry.records.get(&id).cloned(), id, patch);
                    entry.put(&table, merged.clone())?;
                    Ok(merged)
                })
                .await
        })
    }

    fn delete(&self, table: &str, id: RecordId) -> BoxFuture<'static, StorageResult<bool>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| Ok(entry.records.remove(&id).is_some()))
                .await
        })
    }

    fn clear(&self, table: &str) -> BoxFuture<'static, StorageResult<usize>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .with_table(&table, |entry| {
                    let removed = entry.records.len();
                    entry.records.clear();
                    Ok(removed)
                })
                .await
        })
    }

    fn tables(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let engine = self.clone();
        Box::pin(async move {
            let databases = engine.profile.databases.lock().await;
            Ok(databases
                .get(engine.database.as_ref())
                .map(|database| database.tables.keys().cloned().collect())
                .unwrap_or_default())
        })
    }
}
