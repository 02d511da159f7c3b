use serde::Serialize;

use crate::store::ConnectionStatus;

/// Connection report for the record store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Connection status ("connecting", "ready" or "failed").
    pub status: String,
    /// Why opening the database failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthResponse {
    /// Build a report from the store's current status.
    pub fn from_status(status: ConnectionStatus, reason: Option<String>) -> Self {
        Self {
            status: status.as_str().to_string(),
            reason,
        }
    }

    /// Whether the store accepts operations.
    pub fn is_ready(&self) -> bool {
        self.status == ConnectionStatus::Ready.as_str()
    }
}
