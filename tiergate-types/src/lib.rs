//! Core type definitions for Tiergate.
//!
//! This crate defines the vocabulary shared by the registry, the store
//! adapters and the entitlement engine:
//! - User and event identifiers
//! - Subscription tiers and membership status
//! - Typed resource limits (`Limit::Count` / `Limit::Unlimited`)
//! - Calendar-month period keys for usage counters
//! - Membership records, audit entries and bus events
//!
//! The audit sink and event bus traits live here too, so every crate can
//! publish without depending on the engine.

mod audit;
mod event;
mod ids;
mod limit;
mod membership;
mod period;
mod tier;

pub use audit::{AuditEntry, AuditSink, MemoryAuditSink, NullAuditSink};
pub use event::{BroadcastEventBus, Event, EventBus, EventPayload, MemoryEventBus, NullEventBus};
pub use ids::{EventId, UserId};
pub use limit::{Limit, ResourceType, UsageSourceKind};
pub use membership::{CustomLimits, MembershipRecord, MembershipStatus};
pub use period::PeriodKey;
pub use tier::Tier;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing core types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    #[error("invalid membership status: {0}")]
    InvalidStatus(String),

    #[error("invalid resource type: {0:?}")]
    InvalidResourceType(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid period key: {0}")]
    InvalidPeriod(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),
}
