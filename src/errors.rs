//! Configuration Manager Error Hierarchy
//!
//! Defines the error types of the consistency core, grouped by the layer
//! that raises them: request admission, write-lock arbitration, backend
//! execution and local storage.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

use crate::cascade::CascadeAbort;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request rejected before it reached a worker
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// Write-lock arbitration failures
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Backend or operation-handler failures
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Local metadata/value store failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A dependency cascade stopped part way through
    #[error(transparent)]
    Cascade(#[from] Box<CascadeAbort>),

    /// Unknown object, instance or parameter
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request violates the object model (read-only object, bad key shape, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Failed to send shutdown signal: {0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// Task queue at capacity; the request was dropped, not delayed
    #[error("Task queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Queue drained for shutdown
    #[error("Task queue closed")]
    QueueClosed,

    /// Hold window active (reboot, reset, save, ...)
    #[error("Requests suspended: {reason}")]
    Held { reason: String },

    /// A second hold was requested while one is active
    #[error("Hold already active: {reason}")]
    AlreadyHeld { reason: String },

    /// Only the holder may end a hold window early
    #[error("Hold owned by {holder}")]
    NotHolder { holder: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Lock held and the caller asked not to wait
    #[error("Write lock busy (held by txn {txn_id})")]
    Busy { txn_id: u64 },

    /// Wait budget exhausted
    #[error("Write lock wait timed out after {waited:?}")]
    Timeout { waited: Duration },

    /// Release attempted by someone other than the holder
    #[error("Write lock release denied for txn {txn_id}")]
    Denied { txn_id: u64 },

    /// Arbiter closed during shutdown
    #[error("Write lock arbiter closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The operation handler reported a failure
    #[error("{verb} on {object} failed: {message}")]
    Failed {
        object: String,
        verb: &'static str,
        message: String,
    },

    /// Descriptor names a style nobody registered a handler for
    #[error("No operation handler registered for style {style}")]
    NoHandler { style: String },

    /// Backend did not answer in time
    #[error("Backend {backend} did not reply within {after:?}")]
    BackendTimeout { backend: String, after: Duration },

    /// Only replies for older requests arrived
    #[error("Backend {backend} sent stale reply seq {received}, expected {expected}")]
    StaleReply {
        backend: String,
        expected: u64,
        received: u64,
    },

    #[error("Backend {backend} channel closed")]
    ChannelClosed { backend: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(#[from] sled::Error),

    /// Serialization failures for persisted rows
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    #[error("Object {object} has no instance {key}")]
    RowNotFound { object: String, key: String },

    #[error("Object {object} already has instance {key}")]
    DuplicateKey { object: String, key: String },

    /// Every index under the parent is taken up to the largest one
    #[error("Object {object} has no free index under {parent}")]
    IndexExhausted { object: String, parent: String },

    #[error("Object {object} is keyed by {expected} indices, got key {key}")]
    KeyShape {
        object: String,
        expected: usize,
        key: String,
    },

    /// Malformed persisted key bytes
    #[error("Corrupted key in table {table}")]
    CorruptKey { table: String },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::IoError(e))
    }
}

/// Externally visible result classification reported back to requesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    Ok,
    /// Lock timeout; retryable by the caller
    ResourceBusy,
    ValidationError,
    ExecutorFailure,
    SystemFailure,
    NotFound,
    Held,
    QueueFull,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Admission(AdmissionError::Held { .. })
            | Error::Admission(AdmissionError::AlreadyHeld { .. }) => ErrorCode::Held,
            Error::Admission(AdmissionError::QueueFull { .. }) => ErrorCode::QueueFull,
            Error::Admission(AdmissionError::NotHolder { .. }) => ErrorCode::ValidationError,
            Error::Admission(AdmissionError::QueueClosed) => ErrorCode::SystemFailure,
            Error::Lock(LockError::Busy { .. }) | Error::Lock(LockError::Timeout { .. }) => {
                ErrorCode::ResourceBusy
            }
            Error::Lock(LockError::Denied { .. }) => ErrorCode::ValidationError,
            Error::Lock(LockError::Closed) => ErrorCode::SystemFailure,
            Error::Executor(_) => ErrorCode::ExecutorFailure,
            Error::Cascade(abort) => abort.source.code(),
            Error::NotFound(_) | Error::Storage(StorageError::RowNotFound { .. }) => {
                ErrorCode::NotFound
            }
            Error::Validation(_)
            | Error::Storage(StorageError::DuplicateKey { .. })
            | Error::Storage(StorageError::IndexExhausted { .. })
            | Error::Storage(StorageError::KeyShape { .. }) => ErrorCode::ValidationError,
            Error::Storage(_)
            | Error::Config(_)
            | Error::TaskFailed(_)
            | Error::SignalSenderClosed(_)
            | Error::Fatal(_) => ErrorCode::SystemFailure,
        }
    }

    /// Failures that leave the store unusable and must abort a whole pass,
    /// as opposed to a single action or branch.
    pub fn is_system(&self) -> bool {
        self.code() == ErrorCode::SystemFailure
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), ErrorCode::ResourceBusy | ErrorCode::QueueFull | ErrorCode::Held)
    }
}
