//! Entitlement and usage metering for Tiergate.
//!
//! [`EntitlementEngine`] answers two questions on every request:
//! - may this user use module X? ([`EntitlementEngine::can_access_module`])
//! - is this user under the limit for resource Y?
//!   ([`EntitlementEngine::check_usage_limit`])
//!
//! It composes a membership store, a usage store, the tier policy table and
//! the module registry. Audit entries and events are handed to injected
//! collaborators and never read back.
//!
//! Each request should work on its own [`EntitlementEngine::scope`]. A scope
//! shares every collaborator but carries a private membership cache, so one
//! request never sees another's cached reads.

mod cache;
mod engine;
mod error;
mod sweep;
mod usage;

pub use engine::{Clock, EngineBuilder, EntitlementEngine, UpdateOptions};
pub use error::{EntitlementError, EntitlementResult};
pub use usage::{EffectiveLimit, LimitOrigin, UsageLine, UsageResolver};
