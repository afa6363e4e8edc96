//! # Socket Error Taxonomy
//!
//! Every fallible operation in the engine returns one of the variants
//! below. Native failures keep the platform's translated message by
//! carrying the originating [`std::io::Error`] as their source; nothing
//! is retried internally and no error is fatal to the owning socket.

use std::io;

use thiserror::Error;

/// Result type for socket engine operations.
pub type Result<T> = std::result::Result<T, SocketError>;

#[derive(Debug, Error)]
pub enum SocketError {
    /// A call parameter was malformed or missing. Detected before any
    /// syscall is made.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Native raw-socket creation failed.
    #[error("failed to create socket: {source}")]
    Create {
        #[source]
        source: io::Error,
    },

    /// A send or receive syscall failed, including would-block.
    #[error("transfer failed: {source}")]
    Transfer {
        #[source]
        source: io::Error,
    },

    /// A get/set socket option syscall failed.
    #[error("socket option failed: {source}")]
    Option {
        #[source]
        source: io::Error,
    },

    /// The checksum field does not fit inside the outgoing buffer.
    #[error("checksum offset {offset} is out of bounds for length {length}")]
    ChecksumBounds { offset: usize, length: usize },
}

impl SocketError {
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    pub fn create(source: io::Error) -> Self {
        Self::Create { source }
    }

    pub fn transfer(source: io::Error) -> Self {
        Self::Transfer { source }
    }

    pub fn option(source: io::Error) -> Self {
        Self::Option { source }
    }

    /// Returns `true` for a transfer that could not complete right now.
    ///
    /// The caller is expected to wait for the next readiness
    /// notification instead of retrying in a loop.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(
            self,
            Self::Transfer { source } if source.kind() == io::ErrorKind::WouldBlock
        )
    }

    /// Returns `true` when the OS denied the operation, typically
    /// because raw sockets need elevated privileges.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Create { source }
            | Self::Transfer { source }
            | Self::Option { source } => source.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}
