//! Embedded table engines the record store adapts.

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use futures::future::BoxFuture;

use crate::dao::{
    record::{Record, RecordId},
    storage::{StorageError, StorageResult},
};

/// Prefix reserved for engine bookkeeping tables.
pub const RESERVED_PREFIX: &str = "__";
/// Prefix SQLite keeps for its own tables, matched case-insensitively.
pub const SQLITE_PREFIX: &str = "sqlite";
const MAX_NAME_LEN: usize = 64;

/// Name, version and required tables of a database to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDescriptor {
    /// Database name, unique within a profile / data directory.
    pub name: String,
    /// Schema version; raising it triggers the table-creation upgrade.
    pub version: u32,
    /// Tables that must exist once the database is open.
    pub tables: Vec<String>,
}

impl DatabaseDescriptor {
    /// Describe a database without any table.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            tables: Vec::new(),
        }
    }

    /// Require one more table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.tables.push(table.into());
        self
    }

    /// Require every table of `tables`.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.extend(tables.into_iter().map(Into::into));
        self
    }

    /// Requested tables, deduplicated and sorted.
    pub fn table_set(&self) -> BTreeSet<String> {
        self.tables.iter().cloned().collect()
    }

    /// Check the name, the version and every table name.
    pub fn validate(&self) -> StorageResult<()> {
        if !is_valid_name(&self.name) {
            return Err(StorageError::InvalidDescriptor(format!(
                "database name `{}` must be 1-{MAX_NAME_LEN} ASCII alphanumerics, `_` or `-`",
                self.name
            )));
        }

        if self.version == 0 {
            return Err(StorageError::InvalidDescriptor(
                "database version must be at least 1".into(),
            ));
        }

        self.tables
            .iter()
            .try_for_each(|table| validate_table_name(table))?;

        let mut seen = BTreeMap::new();
        for table in self.table_set() {
            if let Some(other) = seen.insert(table.to_ascii_lowercase(), table.clone()) {
                return Err(StorageError::InvalidDescriptor(format!(
                    "tables `{other}` and `{table}` differ only by case"
                )));
            }
        }
        Ok(())
    }
}

/// Reject table names engines cannot store safely.
pub fn validate_table_name(name: &str) -> StorageResult<()> {
    let reserved = name.starts_with(RESERVED_PREFIX)
        || name
            .get(..SQLITE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SQLITE_PREFIX));
    if is_valid_name(name) && !reserved {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName {
            name: name.to_owned(),
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

/// Table-level operations of an opened database.
///
/// Each call runs in its own transaction scoped to one table.
pub trait RecordEngine: Send + Sync {
    /// Fetch one record, `None` when the id is absent.
    fn get(&self, table: &str, id: RecordId) -> BoxFuture<'static, StorageResult<Option<Record>>>;
    /// Every record of the table in ascending key order.
    fn get_all(&self, table: &str) -> BoxFuture<'static, StorageResult<Vec<Record>>>;
    /// Insert a record without `id`, replace the stored one otherwise.
    fn put(&self, table: &str, record: Record) -> BoxFuture<'static, StorageResult<RecordId>>;
    /// Write every record in one transaction; nothing is written on failure.
    fn put_many(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> BoxFuture<'static, StorageResult<Vec<RecordId>>>;
    /// Read, merge and write back in one transaction, returning the written record.
    fn update(
        &self,
        table: &str,
        id: RecordId,
        patch: Record,
    ) -> BoxFuture<'static, StorageResult<Record>>;
    /// Remove a record, reporting whether it existed.
    fn delete(&self, table: &str, id: RecordId) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove every record, returning how many were removed.
    fn clear(&self, table: &str) -> BoxFuture<'static, StorageResult<usize>>;
    /// Names of the tables present in the database.
    fn tables(&self) -> BoxFuture<'static, StorageResult<Vec<String>>>;
}

/// Opens (and upgrades) a database, handing back its engine.
pub trait EngineConnector: Send + Sync {
    /// Open the database, upgrading it when `descriptor.version` is newer.
    fn connect(
        &self,
        descriptor: DatabaseDescriptor,
    ) -> BoxFuture<'static, StorageResult<Arc<dyn RecordEngine>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_builder_collects_tables() {
        let descriptor = DatabaseDescriptor::new("mystery-box", 1)
            .with_table("games")
            .with_tables(["players", "games"]);
        assert_eq!(descriptor.tables, vec!["games", "players", "games"]);
        assert_eq!(descriptor.table_set().len(), 2);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn version_zero_is_rejected() {
        let err = DatabaseDescriptor::new("mystery-box", 0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidDescriptor(_)));
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(DatabaseDescriptor::new("../escape", 1).validate().is_err());
        assert!(DatabaseDescriptor::new("", 1).validate().is_err());
        assert!(validate_table_name("games; DROP TABLE x").is_err());
        assert!(validate_table_name("__meta").is_err());
        assert!(validate_table_name(&"t".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_table_name("saved_games-2").is_ok());
    }

    #[test]
    fn sqlite_prefixed_names_are_rejected() {
        assert!(validate_table_name("sqlite1").is_err());
        assert!(validate_table_name("SQLite-games").is_err());
        assert!(validate_table_name("sqlite_master").is_err());
        assert!(validate_table_name("my_sqlite").is_ok());
    }

    #[test]
    fn tables_differing_only_by_case_are_rejected() {
        let err = DatabaseDescriptor::new("mystery-box", 1)
            .with_tables(["games", "Games"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidDescriptor(_)));

        // Repeating the same spelling is fine
        assert!(
            DatabaseDescriptor::new("mystery-box", 1)
                .with_tables(["games", "games"])
                .validate()
                .is_ok()
        );
    }
}
