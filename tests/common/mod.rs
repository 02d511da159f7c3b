//! Helpers shared by the integration tests.

#![allow(dead_code)]

use mystery_box::{
    DatabaseDescriptor, LocalRecordStore, MemoryProfile, Record, SharedStore,
    dao::game::GAMES_TABLE,
};
use serde_json::Value;

pub const DATABASE: &str = "mystery-box";

/// Route test logs through `RUST_LOG`; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn games_descriptor(version: u32) -> DatabaseDescriptor {
    DatabaseDescriptor::new(DATABASE, version).with_table(GAMES_TABLE)
}

/// A ready store opened on a fresh in-memory profile.
pub async fn memory_store() -> SharedStore {
    memory_store_on(&MemoryProfile::new()).await
}

/// A ready store opened on `profile`.
pub async fn memory_store_on(profile: &MemoryProfile) -> SharedStore {
    init_tracing();
    let store = LocalRecordStore::new();
    let status = store.initialize(profile, games_descriptor(1)).await;
    assert!(status.is_settled());
    store
}

pub fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
