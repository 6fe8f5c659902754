//! Error types for the module registry.

use thiserror::Error;

/// A descriptor failed the structural contract. Checks run in a fixed
/// order and the first failure is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("module id {0:?} must match [a-z0-9_-]+")]
    InvalidId(String),

    #[error("data_schema is missing")]
    MissingSchema,

    #[error("data_schema must be a mapping, got {0}")]
    SchemaNotMapping(&'static str),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid module '{candidate}': {error}")]
    Validation {
        candidate: String,
        error: ValidationError,
    },

    #[error("module id already registered: {0}")]
    DuplicateId(String),

    #[error("failed to instantiate '{candidate}': {message}")]
    InstantiationFailure { candidate: String, message: String },

    #[error("module not found: {0}")]
    NotFound(String),

    #[error("invalid manifest {path}: {message}")]
    InvalidManifest { path: String, message: String },

    #[error("source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub(crate) fn validation(candidate: impl Into<String>, error: ValidationError) -> Self {
        Self::Validation {
            candidate: candidate.into(),
            error,
        }
    }

    pub(crate) fn instantiation(candidate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InstantiationFailure {
            candidate: candidate.into(),
            message: message.into(),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
