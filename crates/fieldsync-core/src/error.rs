//! Error types for fieldsync-core

use std::fmt;

use thiserror::Error;

/// Result type alias using fieldsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// A rejection reported by the remote service itself.
///
/// Service errors are final for the operation that produced them: the engine
/// never queues a write that the backend explicitly refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code, when the gateway speaks HTTP
    pub status: Option<u16>,
    /// Human-readable message from the backend
    pub message: String,
    /// Machine-readable error code, when the backend provides one
    pub code: Option<String>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        Ok(())
    }
}

/// Failure of a single remote gateway call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The service answered and rejected the request
    #[error("Service error: {0}")]
    Service(ServiceError),

    /// The service could not be reached (DNS, connect, TLS, timeout)
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(ServiceError::new(message))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type for remote gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors that can occur in fieldsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The remote service rejected the operation
    #[error("Service error: {0}")]
    Service(ServiceError),

    /// The remote service could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local store unavailable or corrupt
    #[error("Cache error: {0}")]
    Cache(String),

    /// `SQLite` error from the local store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Requested entity is not present in the local cache
    #[error("Not found in cache: {0}")]
    NotFoundInCache(String),

    /// Operation requires a live connection
    #[error("No connectivity: {0} requires a live connection")]
    NoConnectivity(&'static str),

    /// A sync run is already in progress
    #[error("A sync run is already in progress")]
    SyncInProgress,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the local store is the origin of this error.
    pub const fn is_cache_error(&self) -> bool {
        matches!(self, Self::Cache(_) | Self::Database(_))
    }

    /// Whether the remote service explicitly rejected the operation.
    pub const fn is_service_error(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

impl From<GatewayError> for Error {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Service(service) => Self::Service(service),
            GatewayError::Transport(message) => Self::Transport(message),
        }
    }
}
