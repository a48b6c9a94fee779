//! Error types for resto-core

use thiserror::Error;

use crate::models::Collection;

/// Result type alias using resto-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in resto-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The local mirror store could not be opened
    #[error("Local store unavailable: {0}")]
    StoreUnavailable(String),

    /// A mutation targeted a record that is not in the local store
    #[error("{collection} record not found: {id}")]
    RecordNotFound {
        /// Collection that was searched
        collection: Collection,
        /// Requested id
        id: i64,
    },

    /// Network call to the data service failed (connect, timeout, body read)
    #[error("Data service unreachable: {0}")]
    RemoteUnreachable(String),

    /// Data service answered with a non-success status
    #[error("Data service rejected request: {message} ({status})")]
    RemoteRejected {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response
        message: String,
    },

    /// Input rejected before touching the store or the network
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A reconciliation pass is already running
    #[error("A sync pass is already in progress")]
    SyncInProgress,

    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::RemoteUnreachable(error.to_string())
    }
}

impl Error {
    /// Whether the error came from talking to the data service.
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnreachable(_) | Self::RemoteRejected { .. }
        )
    }
}
