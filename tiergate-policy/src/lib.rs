//! Tier policy table for Tiergate.
//!
//! Each tier maps to a [`TierPolicy`]: the resource limits that apply to its
//! members and the set of modules they may use. The table is loaded once per
//! process (usually from `tiers.toml`) and is read-only afterwards.

mod error;
mod table;

pub use error::{PolicyError, PolicyResult};
pub use table::{default_policy_path, AllowedModules, TierPolicy, TierPolicyTable};
