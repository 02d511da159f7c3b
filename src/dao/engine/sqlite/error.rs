//! Error types of the SQLite engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`SqliteDaoError`] failures.
pub type SqliteResult<T> = Result<T, SqliteDaoError>;

/// Failures that can occur while talking to SQLite.
#[derive(Debug, Error)]
pub enum SqliteDaoError {
    /// The data directory could not be created.
    #[error("failed to create data directory `{path}`")]
    CreateDataDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// SQLite refused to open the database file.
    #[error("failed to open SQLite database `{path}`")]
    Open {
        /// Database file.
        path: PathBuf,
        /// SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Reading `PRAGMA user_version` or the table list failed.
    #[error("failed to read the schema of `{database}`")]
    ReadSchema {
        /// Database name.
        database: String,
        /// SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating tables or bumping the version failed; the upgrade was rolled back.
    #[error("failed to upgrade `{database}` to version {version}")]
    Upgrade {
        /// Database name.
        database: String,
        /// Target version.
        version: u32,
        /// SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement against a record table failed.
    #[error("SQLite statement failed on table `{table}`")]
    Statement {
        /// Table the statement ran against.
        table: String,
        /// SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A previous statement panicked while holding the connection.
    #[error("SQLite connection lock poisoned")]
    Poisoned,
    /// The blocking task running a statement did not complete.
    #[error("SQLite blocking task failed")]
    Join {
        /// Join failure reported by tokio.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl SqliteDaoError {
    pub(super) fn statement(table: &str) -> impl FnOnce(rusqlite::Error) -> Self + '_ {
        move |source| SqliteDaoError::Statement {
            table: table.to_owned(),
            source,
        }
    }
}

impl From<SqliteDaoError> for StorageError {
    fn from(err: SqliteDaoError) -> Self {
        StorageError::engine(err.to_string(), err)
    }
}
