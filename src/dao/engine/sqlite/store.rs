use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;
use rusqlite::{Connection, OptionalExtension, params};
use tokio::task;
use tracing::{debug, info};

use super::error::{SqliteDaoError, SqliteResult};
use crate::dao::{
    engine::{DatabaseDescriptor, EngineConnector, RecordEngine},
    record::{KEY_FIELD, Record, RecordId, merge_patch, record_key, with_key},
    storage::{StorageError, StorageResult},
};

const DATABASE_EXTENSION: &str = "sqlite3";

/// Opens databases as SQLite files inside one data directory.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    data_dir: PathBuf,
}

impl SqliteConnector {
    /// Keep every database file under `data_dir`, created on first open.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Directory holding the database files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File backing the database called `name`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.{DATABASE_EXTENSION}"))
    }
}

impl EngineConnector for SqliteConnector {
    fn connect(
        &self,
        descriptor: DatabaseDescriptor,
    ) -> BoxFuture<'static, StorageResult<Arc<dyn RecordEngine>>> {
        let connector = self.clone();
        Box::pin(async move {
            let engine: Arc<dyn RecordEngine> =
                Arc::new(SqliteRecordEngine::open(connector, descriptor).await?);
            Ok(engine)
        })
    }
}

/// Engine over one SQLite database file.
///
/// Every table is `(id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT)` where
/// `body` is the record without its `id` member.
#[derive(Clone)]
pub struct SqliteRecordEngine {
    inner: Arc<SqliteInner>,
}

struct SqliteInner {
    connection: Mutex<Connection>,
    tables: BTreeSet<String>,
}

impl SqliteRecordEngine {
    /// Open (creating if needed) and upgrade the database described by `descriptor`.
    pub async fn open(
        connector: SqliteConnector,
        descriptor: DatabaseDescriptor,
    ) -> StorageResult<Self> {
        descriptor.validate()?;
        task::spawn_blocking(move || Self::open_blocking(&connector, &descriptor))
            .await
            .map_err(|source| SqliteDaoError::Join { source })?
    }

    fn open_blocking(
        connector: &SqliteConnector,
        descriptor: &DatabaseDescriptor,
    ) -> StorageResult<Self> {
        let data_dir = connector.data_dir();
        fs::create_dir_all(data_dir).map_err(|source| SqliteDaoError::CreateDataDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let path = connector.database_path(&descriptor.name);
        let mut connection = Connection::open(&path).map_err(|source| SqliteDaoError::Open {
            path: path.clone(),
            source,
        })?;

        let stored = read_version(&connection, &descriptor.name)?;
        if stored > descriptor.version {
            return Err(StorageError::VersionConflict {
                database: descriptor.name.clone(),
                stored,
                requested: descriptor.version,
            });
        }

        if stored < descriptor.version {
            info!(
                database = %descriptor.name,
                from = stored,
                to = descriptor.version,
                "upgrading SQLite database"
            );
            upgrade(&mut connection, descriptor)?;
        }

        let tables = read_tables(&connection, &descriptor.name)?;
        info!(path = %path.display(), tables = tables.len(), "SQLite database ready");

        Ok(Self {
            inner: Arc::new(SqliteInner {
                connection: Mutex::new(connection),
                tables,
            }),
        })
    }

    /// Run `work` on the blocking pool against an existing table.
    async fn run<T, F>(&self, table: String, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> StorageResult<T> + Send + 'static,
    {
        if !self.inner.tables.contains(&table) {
            return Err(StorageError::unknown_table(&table));
        }

        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || {
            let mut connection = inner
                .connection
                .lock()
                .map_err(|_| SqliteDaoError::Poisoned)?;
            work(&mut *connection, &table)
        })
        .await
        .map_err(|source| SqliteDaoError::Join { source })?
    }
}

fn read_version(connection: &Connection, database: &str) -> SqliteResult<u32> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|source| SqliteDaoError::ReadSchema {
            database: database.to_owned(),
            source,
        })
}

fn read_tables(connection: &Connection, database: &str) -> SqliteResult<BTreeSet<String>> {
    let read_schema = |source| SqliteDaoError::ReadSchema {
        database: database.to_owned(),
        source,
    };

    let mut stmt = connection
        .prepare(r"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'")
        .map_err(read_schema)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<BTreeSet<_>, _>>())
        .map_err(read_schema)?;
    Ok(names)
}

fn upgrade(connection: &mut Connection, descriptor: &DatabaseDescriptor) -> SqliteResult<()> {
    let upgrade_failed = |source| SqliteDaoError::Upgrade {
        database: descriptor.name.clone(),
        version: descriptor.version,
        source,
    };

    let tx = connection.transaction().map_err(upgrade_failed)?;
    for table in descriptor.table_set() {
        debug!(table = %table, "ensuring table exists");
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    body TEXT NOT NULL
                )"
            ),
            [],
        )
        .map_err(upgrade_failed)?;
    }
    tx.pragma_update(None, "user_version", descriptor.version)
        .map_err(upgrade_failed)?;
    tx.commit().map_err(upgrade_failed)
}

fn sql_key(table: &str, id: RecordId) -> StorageResult<i64> {
    i64::try_from(id.get()).map_err(|_| StorageError::InvalidKey {
        table: table.to_owned(),
        reason: format!("key {id} does not fit a SQLite integer"),
    })
}

fn stored_key(table: &str, rowid: i64) -> StorageResult<RecordId> {
    u64::try_from(rowid)
        .map(RecordId::new)
        .map_err(|_| StorageError::InvalidKey {
            table: table.to_owned(),
            reason: format!("SQLite holds a negative key {rowid}"),
        })
}

fn decode_body(table: &str, id: RecordId, body: &str) -> StorageResult<Record> {
    let record = serde_json::from_str::<Record>(body).map_err(|source| StorageError::Corrupted {
        table: table.to_owned(),
        id,
        source,
    })?;
    Ok(with_key(record, id))
}

fn read_record(connection: &Connection, table: &str, id: RecordId) -> StorageResult<Option<Record>> {
    let key = sql_key(table, id)?;
    let body = connection
        .prepare_cached(&format!("SELECT body FROM \"{table}\" WHERE id = ?1"))
        .and_then(|mut stmt| {
            stmt.query_row(params![key], |row| row.get::<_, String>(0))
                .optional()
        })
        .map_err(SqliteDaoError::statement(table))?;

    body.map(|body| decode_body(table, id, &body)).transpose()
}

fn write_record(connection: &Connection, table: &str, record: Record) -> StorageResult<RecordId> {
    let key = record_key(table, &record)?;
    let mut body = record;
    body.remove(KEY_FIELD);
    let body = serde_json::to_string(&body).map_err(|source| StorageError::Encode {
        table: table.to_owned(),
        source,
    })?;

    match key {
        Some(id) => {
            let key = sql_key(table, id)?;
            connection
                .prepare_cached(&format!(
                    "INSERT OR REPLACE INTO \"{table}\" (id, body) VALUES (?1, ?2)"
                ))
                .and_then(|mut stmt| stmt.execute(params![key, body]))
                .map_err(SqliteDaoError::statement(table))?;
            Ok(id)
        }
        None => {
            connection
                .prepare_cached(&format!("INSERT INTO \"{table}\" (body) VALUES (?1)"))
                .and_then(|mut stmt| stmt.execute(params![body]))
                .map_err(SqliteDaoError::statement(table))?;
            stored_key(table, connection.last_insert_rowid())
        }
    }
}

impl RecordEngine for SqliteRecordEngine {
    fn get(&self, table: &str, id: RecordId) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .run(table, move |connection, table| read_record(connection, table, id))
                .await
        })
    }

    fn get_all(&self, table: &str) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .run(table, |connection, table| {
                    let rows = connection
                        .prepare_cached(&format!("SELECT id, body FROM \"{table}\" ORDER BY id"))
                        .and_then(|mut stmt| {
                            let rows = stmt.query_map([], |row| {
                                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                            })?;
                            rows.collect::<Result<Vec<_>, _>>()
                        })
                        .map_err(SqliteDaoError::statement(table))?;

                    rows.into_iter()
                        .map(|(key, body)| decode_body(table, stored_key(table, key)?, &body))
                        .collect()
                })
                .await
        })
    }

    fn put(&self, table: &str, record: Record) -> BoxFuture<'static, StorageResult<RecordId>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .run(table, move |connection, table| {
                    let tx = connection
                        .transaction()
                        .map_err(SqliteDaoError::statement(table))?;
                    let id = write_record(&tx, table, record)?;
                    tx.commit().map_err(SqliteDaoError::statement(table))?;
                    Ok(id)
                })
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
                .run(table, move |connection, table| {
                    let tx = connection
                        .transaction()
                        .map_err(SqliteDaoError::statement(table))?;
                    let ids = records
                        .into_iter()
                        .map(|record| write_record(&tx, table, record))
                        .collect::<StorageResult<Vec<_>>>()?;
                    tx.commit().map_err(SqliteDaoError::statement(table))?;
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
                .run(table, move |connection, table| {
                    let tx = connection
                        .transaction()
                        .map_err(SqliteDaoError::statement(table))?;
                    let existing = read_record(&tx, table, id)?;
                    let merged = merge_patch(existing, id, patch);
                    write_record(&tx, table, merged.clone())?;
                    tx.commit().map_err(SqliteDaoError::statement(table))?;
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
                .run(table, move |connection, table| {
                    let key = sql_key(table, id)?;
                    let removed = connection
                        .execute(&format!("DELETE FROM \"{table}\" WHERE id = ?1"), params![key])
                        .map_err(SqliteDaoError::statement(table))?;
                    Ok(removed > 0)
                })
                .await
        })
    }

    fn clear(&self, table: &str) -> BoxFuture<'static, StorageResult<usize>> {
        let engine = self.clone();
        let table = table.to_owned();
        Box::pin(async move {
            engine
                .run(table, |connection, table| {
                    let removed = connection
                        .execute(&format!("DELETE FROM \"{table}\""), [])
                        .map_err(SqliteDaoError::statement(table))?;
                    Ok(removed)
                })
                .await
        })
    }

    fn tables(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let tables = self.inner.tables.iter().cloned().collect();
        Box::pin(async move { Ok(tables) })
    }
}
