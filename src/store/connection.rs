use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::dao::{
    engine::{DatabaseDescriptor, RecordEngine},
    storage::StorageResult,
};

/// Lifecycle of the single store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No open attempt has settled yet.
    Connecting,
    /// The engine is open and every operation can run.
    Ready,
    /// Opening failed; the store stays unusable.
    Failed,
}

impl ConnectionStatus {
    /// Whether the status can no longer change.
    pub fn is_settled(self) -> bool {
        !matches!(self, ConnectionStatus::Connecting)
    }

    /// Lower-case label used in logs and health reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when trying to settle a connection twice.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection already settled as {current}")]
pub struct AlreadySettled {
    /// Status the connection settled on.
    pub current: ConnectionStatus,
}

/// Connection state machine: `Connecting` moves once to `Ready` or `Failed`.
pub(crate) enum Connection {
    Connecting,
    Ready {
        engine: Arc<dyn RecordEngine>,
        descriptor: DatabaseDescriptor,
    },
    Failed {
        descriptor: DatabaseDescriptor,
        reason: String,
    },
}

impl Connection {
    pub(crate) fn status(&self) -> ConnectionStatus {
        match self {
            Connection::Connecting => ConnectionStatus::Connecting,
            Connection::Ready { .. } => ConnectionStatus::Ready,
            Connection::Failed { .. } => ConnectionStatus::Failed,
        }
    }

    pub(crate) fn engine(&self) -> Option<Arc<dyn RecordEngine>> {
        match self {
            Connection::Ready { engine, .. } => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    pub(crate) fn descriptor(&self) -> Option<&DatabaseDescriptor> {
        match self {
            Connection::Connecting => None,
            Connection::Ready { descriptor, .. } | Connection::Failed { descriptor, .. } => {
                Some(descriptor)
            }
        }
    }

    pub(crate) fn failure_reason(&self) -> Option<&str> {
        match self {
            Connection::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Apply the outcome of the open attempt.
    pub(crate) fn settle(
        &mut self,
        descriptor: DatabaseDescriptor,
        outcome: StorageResult<Arc<dyn RecordEngine>>,
    ) -> Result<ConnectionStatus, AlreadySettled> {
        if self.status().is_settled() {
            return Err(AlreadySettled {
                current: self.status(),
            });
        }

        *self = match outcome {
            Ok(engine) => Connection::Ready { engine, descriptor },
            Err(err) => Connection::Failed {
                descriptor,
                reason: err.to_string(),
            },
        };
        Ok(self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        engine::{EngineConnector, memory::MemoryProfile},
        storage::StorageError,
    };

    fn descriptor() -> DatabaseDescriptor {
        DatabaseDescriptor::new("mystery-box", 1).with_table("games")
    }

    async fn engine() -> Arc<dyn RecordEngine> {
        MemoryProfile::new()
            .connect(descriptor())
            .await
            .ok()
            .unwrap()
    }

    #[tokio::test]
    async fn connecting_moves_to_ready() {
        let mut connection = Connection::Connecting;
        assert_eq!(connection.status(), ConnectionStatus::Connecting);

        let next = connection.settle(descriptor(), Ok(engine().await)).unwrap();

        assert_eq!(next, ConnectionStatus::Ready);
        assert!(connection.engine().is_some());
        assert_eq!(connection.descriptor(), Some(&descriptor()));
    }

    #[test]
    fn connecting_moves_to_failed() {
        let mut connection = Connection::Connecting;

        let next = connection
            .settle(
                descriptor(),
                Err(StorageError::InvalidDescriptor("boom".into())),
            )
            .unwrap();

        assert_eq!(next, ConnectionStatus::Failed);
        assert!(connection.engine().is_none());
        assert_eq!(
            connection.failure_reason(),
            Some("invalid database descriptor: boom")
        );
    }

    #[tokio::test]
    async fn settled_connection_cannot_change() {
        let mut connection = Connection::Connecting;
        connection
            .settle(
                descriptor(),
                Err(StorageError::InvalidDescriptor("boom".into())),
            )
            .unwrap();

        let err = connection
            .settle(descriptor(), Ok(engine().await))
            .unwrap_err();

        assert_eq!(
            err,
            AlreadySettled {
                current: ConnectionStatus::Failed
            }
        );
        assert_eq!(connection.status(), ConnectionStatus::Failed);
    }

    #[test]
    fn only_connecting_is_unsettled() {
        assert!(!ConnectionStatus::Connecting.is_settled());
        assert!(ConnectionStatus::Ready.is_settled());
        assert!(ConnectionStatus::Failed.is_settled());
        assert_eq!(ConnectionStatus::Failed.to_string(), "failed");
    }
}
