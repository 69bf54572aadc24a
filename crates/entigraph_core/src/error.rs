//! Error types for the mapping engine.

use crate::entity::EntityId;
use std::sync::Arc;
use thiserror::Error;

/// Result type for mapping and cache operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// A cloneable, type-erased error used as the source of nested failures.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while decoding, encoding or caching entities.
///
/// Errors are `Clone` so that every caller waiting on a shared request
/// observes the same failure.
#[derive(Error, Debug, Clone)]
pub enum MappingError {
    /// A required wire key was absent from the payload.
    #[error("missing required key `{key}`")]
    MissingKey {
        /// Wire key that was expected.
        key: String,
    },

    /// A wire value could not be converted into the declared field type.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// Wire key holding the bad value.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// A custom decode or side-effect rule reported a failure.
    #[error("rule `{key}` failed: {message}")]
    Rule {
        /// Entity key of the failing rule.
        key: String,
        /// Failure description.
        message: String,
    },

    /// The nested fetch behind an async rule failed.
    #[error("async resolution of `{field}` failed: {source}")]
    AsyncResolution {
        /// Entity field the continuation was meant to set.
        field: String,
        /// Underlying failure.
        source: SharedError,
    },

    /// Two distinct instances were registered under one id.
    #[error("cache conflict in scope `{scope}`: a different instance is registered for id {id}")]
    CacheConflict {
        /// Name of the cache scope.
        scope: String,
        /// Conflicting id.
        id: EntityId,
    },

    /// An async rule was evaluated outside a Tokio runtime.
    #[error("no async runtime available to resolve `{field}`")]
    NoRuntime {
        /// Entity field of the async rule.
        field: String,
    },

    /// A rule table failed validation when it was built.
    #[error("invalid mapping table: {0}")]
    Table(String),
}

impl MappingError {
    /// Creates a missing-key error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Creates an invalid-value error.
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a custom rule failure.
    pub fn rule(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps a nested fetch failure for the given field.
    pub fn async_resolution<E>(field: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AsyncResolution {
            field: field.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true if this error came from a synchronous rule.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            MappingError::MissingKey { .. }
                | MappingError::InvalidValue { .. }
                | MappingError::Rule { .. }
        )
    }
}
