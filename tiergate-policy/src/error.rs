//! Error types for policy loading.

use thiserror::Error;

/// Policy-specific errors.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),

    /// The policy file is not valid TOML or has the wrong shape.
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A `[tiers.<name>]` section names a tier that does not exist.
    #[error("unknown tier in policy: {0}")]
    UnknownTier(String),

    /// A limits key is not a valid resource type.
    #[error("invalid resource type in tier '{tier}': {name}")]
    InvalidResource { tier: String, name: String },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
