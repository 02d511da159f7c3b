use tracing::warn;

use crate::{dto::health::HealthResponse, store::SharedStore};

/// Report the store's connection status, logging when it failed to open.
pub async fn store_health(store: &SharedStore) -> HealthResponse {
    let status = store.status();
    let reason = store.failure_reason().await;

    if let Some(ref reason) = reason {
        warn!(%status, %reason, "record store unavailable");
    }

    HealthResponse::from_status(status, reason)
}
