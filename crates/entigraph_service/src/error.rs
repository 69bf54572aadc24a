//! Error types for entity services.

use entigraph_core::{EntityId, MappingError};
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur while reading, decoding or writing entities.
///
/// Cloneable so that every caller sharing one in-flight read receives
/// the same failure.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// The upstream resource has no record with this id.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource (endpoint) name.
        resource: String,
        /// Requested id.
        id: EntityId,
    },

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The upstream returned a body that is not a valid record.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Decoding or caching failed.
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl ServiceError {
    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>, id: EntityId) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transport { retryable: true, .. })
    }

    /// Returns true if the record does not exist upstream.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ServiceError::transport_retryable("connection reset").is_retryable());
        assert!(!ServiceError::transport_fatal("bad request").is_retryable());
        assert!(!ServiceError::not_found("units", EntityId::from(7)).is_retryable());
        assert!(!ServiceError::Protocol("not json".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = ServiceError::not_found("units", EntityId::from(7));
        assert_eq!(err.to_string(), "units 7 not found");
        assert!(err.is_not_found());

        let err = ServiceError::from(MappingError::missing("id"));
        assert_eq!(err.to_string(), "missing required key `id`");
    }
}
