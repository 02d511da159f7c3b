//! Local record store for the Mystery Box game builder.
//!
//! A versioned database of named tables whose records are JSON objects keyed
//! by an auto-incremented `id`, opened once through a pluggable engine and
//! shared by every caller, plus the game catalogue built on top of it.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod services;
pub mod store;

pub use config::{EngineKind, StoreConfig};
pub use dao::{
    engine::{DatabaseDescriptor, EngineConnector, RecordEngine, memory::MemoryProfile},
    record::{Record, RecordId},
    storage::{StorageError, StorageResult},
};
pub use error::ServiceError;
pub use store::{ConnectionStatus, LocalRecordStore, SharedStore};
