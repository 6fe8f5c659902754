//! Error types for the entitlement engine.

use thiserror::Error;
use tiergate_store::StoreError;
use tiergate_types::{ResourceType, UserId};

/// Result type for entitlement operations.
pub type EntitlementResult<T> = Result<T, EntitlementError>;

#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The requested tier is not one of the known tiers. Nothing was changed.
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// The user has no membership record.
    #[error("no membership for user {0}")]
    NotFound(UserId),

    /// A bounded resource whose usage is measured outside the stores cannot
    /// be consumed atomically here.
    #[error("usage of {0} is measured externally and cannot be consumed here")]
    ExternallyMetered(ResourceType),

    /// The store failed. The membership cache was left untouched.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}
