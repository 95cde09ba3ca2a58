//! Error types for the stash engine.

use thiserror::Error;

use crate::{ContainerId, SocketIndex};

/// Result type for engine and store operations.
pub type Result<T> = std::result::Result<T, StashError>;

/// Errors surfaced to the host or an operator.
///
/// Blob decode failures are not errors: corrupt contents degrade to empty.
#[derive(Debug, Error)]
pub enum StashError {
    /// Backing store I/O failed. Not retried.
    #[error("backing store failure during {op}")]
    Store {
        op: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("unknown container type '{0}'")]
    UnknownContainerType(String),

    #[error("container {0} does not exist")]
    UnknownContainer(ContainerId),

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("void audit entry {0} does not exist")]
    AuditEntryNotFound(i64),

    #[error("void audit entry {0} was already recovered")]
    AlreadyRecovered(i64),

    #[error("void audit entry {0} has an unreadable item payload")]
    CorruptPayload(i64),

    #[error("actor {0} is not online")]
    ActorOffline(String),

    #[error("socket {socket} of container {container} is out of range")]
    InvalidSocket {
        container: ContainerId,
        socket: SocketIndex,
    },
}

impl StashError {
    pub fn store<E>(op: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Store {
            op,
            source: source.into(),
        }
    }
}
