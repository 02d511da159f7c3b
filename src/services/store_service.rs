use tracing::info;

use crate::{
    config::StoreConfig,
    store::{ConnectionStatus, LocalRecordStore, SharedStore},
};

/// Open a private store with the configured engine and database.
///
/// The returned store is settled: either `Ready` or `Failed`.
pub async fn open_store(config: &StoreConfig) -> SharedStore {
    let store = LocalRecordStore::new();
    connect(&store, config).await;
    store
}

/// Open the process-wide store. Later calls return the already settled store.
pub async fn open_global_store(config: &StoreConfig) -> SharedStore {
    let store = LocalRecordStore::global();
    connect(&store, config).await;
    store
}

async fn connect(store: &SharedStore, config: &StoreConfig) -> ConnectionStatus {
    let connector = config.connector();
    let status = store
        .initialize(connector.as_ref(), config.descriptor())
        .await;
    info!(
        database = %config.database_name,
        version = config.version,
        %status,
        "record store settled"
    );
    status
}
