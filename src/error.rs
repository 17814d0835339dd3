//! Error types and wire statuses for the buffer hub

use serde::{Deserialize, Serialize};

/// Result type alias for buffer hub operations
pub type Result<T> = std::result::Result<T, BufferHubError>;

/// Error types raised by the buffer hub service, its clients and its allocators
#[derive(Debug, thiserror::Error)]
pub enum BufferHubError {
    /// I/O related errors (memfd, mmap, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The graphics allocator could not provide backing storage
    #[error("Allocation failed: {message}")]
    Allocation { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Token absent, malformed, forged, consumed or revoked.
    ///
    /// The cause is intentionally not carried.
    #[error("Invalid token")]
    InvalidToken,

    /// Operation attempted on a closed client
    #[error("Client {client_id} is closed")]
    ClientClosed { client_id: u64 },

    /// Every client-state bit of the node is taken
    #[error("Buffer {buffer_id} has no free client slot (max {max_clients})")]
    MaxClients { buffer_id: u32, max_clients: u32 },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl BufferHubError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an allocation error
    pub fn allocation(message: impl Into<String>) -> Self {
        Self::Allocation {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a client closed error
    pub fn client_closed(client_id: u64) -> Self {
        Self::ClientClosed { client_id }
    }

    /// Create a max clients error
    pub fn max_clients(buffer_id: u32, max_clients: u32) -> Self {
        Self::MaxClients {
            buffer_id,
            max_clients,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Map this error onto the status reported to remote callers
    pub fn status(&self) -> BufferHubStatus {
        match self {
            BufferHubError::ClientClosed { .. } => BufferHubStatus::ClientClosed,
            BufferHubError::InvalidToken => BufferHubStatus::InvalidToken,
            BufferHubError::MaxClients { .. } => BufferHubStatus::MaxClient,
            BufferHubError::Io { .. }
            | BufferHubError::Allocation { .. }
            | BufferHubError::InvalidParameter { .. }
            | BufferHubError::Serialization { .. }
            | BufferHubError::Platform { .. } => BufferHubStatus::AllocationFailed,
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for BufferHubError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<bincode::Error> for BufferHubError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(format!("Bincode error: {}", err))
    }
}

impl From<nix::Error> for BufferHubError {
    fn from(err: nix::Error) -> Self {
        Self::platform(err.to_string())
    }
}

/// Status codes returned across the service boundary
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferHubStatus {
    NoError = 0,
    AllocationFailed = 1,
    InvalidToken = 2,
    /// Reserved; an import whose origin is gone reports `InvalidToken`
    BufferFreed = 3,
    ClientClosed = 4,
    MaxClient = 5,
}

impl BufferHubStatus {
    /// Status of an operation result
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => BufferHubStatus::NoError,
            Err(e) => e.status(),
        }
    }

    /// Whether this is the success status
    pub fn is_ok(&self) -> bool {
        matches!(self, BufferHubStatus::NoError)
    }
}

impl From<&BufferHubError> for BufferHubStatus {
    fn from(error: &BufferHubError) -> Self {
        error.status()
    }
}

impl std::fmt::Display for BufferHubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BufferHubStatus::NoError => "NO_ERROR",
            BufferHubStatus::AllocationFailed => "ALLOCATION_FAILED",
            BufferHubStatus::InvalidToken => "INVALID_TOKEN",
            BufferHubStatus::BufferFreed => "BUFFER_FREED",
            BufferHubStatus::ClientClosed => "CLIENT_CLOSED",
            BufferHubStatus::MaxClient => "MAX_CLIENT",
        };
        f.write_str(name)
    }
}
