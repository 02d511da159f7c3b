use std::error::Error;
use thiserror::Error;

use crate::{dao::record::RecordId, store::ConnectionStatus};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the record store and its engines regardless of the backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An operation was attempted before the connection reached `Ready`.
    #[error("record store is not initialized (status: {status})")]
    Uninitialized {
        /// Status the store was in.
        status: ConnectionStatus,
    },
    /// The database descriptor handed to the connector is unusable.
    #[error("invalid database descriptor: {0}")]
    InvalidDescriptor(String),
    /// A table name does not follow the naming rules.
    #[error("invalid table name `{name}`")]
    InvalidTableName {
        /// Rejected name.
        name: String,
    },
    /// The table was never created in the opened database.
    #[error("unknown table `{table}`")]
    UnknownTable {
        /// Requested table.
        table: String,
    },
    /// The stored database is newer than the requested version.
    #[error("database `{database}` is at version {stored}, cannot open it at version {requested}")]
    VersionConflict {
        /// Database name.
        database: String,
        /// Version found on disk.
        stored: u32,
        /// Version the caller asked for.
        requested: u32,
    },
    /// The `id` member of a record is not a usable key.
    #[error("invalid key for table `{table}`: {reason}")]
    InvalidKey {
        /// Table the record belongs to.
        table: String,
        /// What is wrong with the key.
        reason: String,
    },
    /// A persisted record body is not a JSON object.
    #[error("record `{id}` in table `{table}` is corrupted")]
    Corrupted {
        /// Table holding the record.
        table: String,
        /// Key of the unreadable record.
        id: RecordId,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// A typed value could not be turned into a JSON object record.
    #[error("failed to encode record for table `{table}`")]
    Encode {
        /// Destination table.
        table: String,
        /// Serialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be decoded into the expected model.
    #[error("failed to decode record {id:?} from table `{table}`")]
    Decode {
        /// Source table.
        table: String,
        /// Key of the record, when it had one.
        id: Option<RecordId>,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
    /// Any other failure reported by the underlying engine.
    #[error("storage engine failure: {message}")]
    Engine {
        /// Backend description of the failure.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an engine error from any backend failure.
    pub fn engine(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Engine {
            message,
            source: Box::new(source),
        }
    }

    pub(crate) fn unknown_table(table: &str) -> Self {
        StorageError::UnknownTable {
            table: table.to_owned(),
        }
    }
}
