//! Common Error Types
//!
//! Root error unifying the per-module errors for the binary and for callers
//! that drive several layers at once.

use thiserror::Error;

use crate::codec::CodecError;
use crate::manager::{ErrorClass, ManagerError};
use crate::pod::PodError;
use crate::storage::StorageError;

/// Root error type for the pod protocol
#[derive(Debug, Error)]
pub enum PodProtocolError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Malformed Bitcoin data
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Pod state machine errors
    #[error("pod error: {0}")]
    Pod(#[from] PodError),

    /// Manager errors
    #[error("manager error: {0}")]
    Manager(#[from] ManagerError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PodProtocolError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this is a retryable error
    ///
    /// Protocol failures are deterministic; only IO is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PodProtocolError::Io(_))
    }

    /// Failure class, where one applies
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            PodProtocolError::Manager(err) => Some(err.class()),
            PodProtocolError::Codec(_) | PodProtocolError::Validation(_) => {
                Some(ErrorClass::MalformedInput)
            }
            PodProtocolError::Pod(err) => Some(ManagerError::Pod(err.clone()).class()),
            PodProtocolError::Storage(_) => Some(ErrorClass::Consistency),
            _ => None,
        }
    }

    /// Get error code
    pub fn error_code(&self) -> &'static str {
        match self {
            PodProtocolError::Config(_) => "CONFIG_ERROR",
            PodProtocolError::Logging(_) => "LOGGING_ERROR",
            PodProtocolError::Codec(_) => "MALFORMED_BITCOIN_DATA",
            PodProtocolError::Pod(_) => "POD_ERROR",
            PodProtocolError::Manager(err) => err.error_code(),
            PodProtocolError::Storage(_) => "STORAGE_ERROR",
            PodProtocolError::Validation(_) => "VALIDATION_ERROR",
            PodProtocolError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using PodProtocolError
pub type Result<T> = std::result::Result<T, PodProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PodProtocolError::validation("bad hex");
        assert!(err.to_string().contains("bad hex"));
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_manager_codes_pass_through() {
        let err = PodProtocolError::from(ManagerError::NothingToWithdraw("pod_1".into()));
        assert_eq!(err.error_code(), "NOTHING_TO_WITHDRAW");
        assert_eq!(err.class(), Some(ErrorClass::StatePrecondition));
    }

    #[test]
    fn test_retryable_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(PodProtocolError::from(io).is_retryable());
        assert!(!PodProtocolError::from(CodecError::InvalidPsbtMagic).is_retryable());
        assert!(!PodProtocolError::from(ManagerError::Paused).is_retryable());
    }
}
