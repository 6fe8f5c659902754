//! Persisted per-user subscription state.

use crate::{Limit, ResourceType, Tier, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Per-user limit overrides, keyed by resource type.
pub type CustomLimits = BTreeMap<ResourceType, Limit>;

/// Lifecycle status of a membership. Only `Active` records take part in
/// entitlement checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    Active,
    /// Set by the expiration sweep once `expires_at` has passed.
    Expired,
    /// Set by billing events.
    Cancelled,
    /// Payment problem reported by the billing provider.
    Suspended,
}

impl MembershipStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Suspended => "suspended",
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "suspended" => Ok(Self::Suspended),
            _ => Err(crate::Error::InvalidStatus(s.to_string())),
        }
    }
}

/// One user's subscription. The store keeps at most one per user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub user_id: UserId,
    pub tier: Tier,
    pub status: MembershipStatus,
    #[serde(default)]
    pub custom_limits: CustomLimits,
    pub starts_at: DateTime<Utc>,
    /// `None` means the membership never expires.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provider_customer_ref: Option<String>,
    #[serde(default)]
    pub provider_subscription_ref: Option<String>,
}

impl MembershipRecord {
    /// A fresh active record starting at `starts_at`, with no overrides and
    /// no expiry.
    #[must_use]
    pub fn new(user_id: UserId, tier: Tier, starts_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            tier,
            status: MembershipStatus::Active,
            custom_limits: CustomLimits::new(),
            starts_at,
            expires_at: None,
            provider_customer_ref: None,
            provider_subscription_ref: None,
        }
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_custom_limit(mut self, resource: ResourceType, limit: Limit) -> Self {
        self.custom_limits.insert(resource, limit);
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true if the record is active and its expiry is strictly
    /// before `now`.
    #[must_use]
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Per-user override for `resource`, if any.
    #[must_use]
    pub fn custom_limit(&self, resource: &ResourceType) -> Option<Limit> {
        self.custom_limits.get(resource).copied()
    }
}
