//! Usage metering: limit resolution, current usage and consumption.

use crate::engine::EntitlementEngine;
use crate::error::{EntitlementError, EntitlementResult};
use serde::Serialize;
use std::collections::BTreeSet;
use tiergate_types::{Limit, PeriodKey, ResourceType, Tier, UsageSourceKind, UserId};
use tracing::{debug, info};

/// Supplies usage for resource types the stores do not measure.
pub trait UsageResolver: Send + Sync {
    fn current_usage(
        &self,
        resource: &ResourceType,
        user_id: UserId,
        period: PeriodKey,
    ) -> EntitlementResult<u64>;
}

/// Where an effective limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitOrigin {
    /// The user's own override.
    Custom,
    /// The tier-wide policy.
    Tier,
    /// Nothing configured; usage is allowed.
    None,
}

/// A resolved limit and its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveLimit {
    pub limit: Option<Limit>,
    pub origin: LimitOrigin,
}

impl EffectiveLimit {
    /// Strict less-than check; no limit allows.
    #[must_use]
    pub fn allows(&self, used: u64) -> bool {
        self.limit.is_none_or(|limit| limit.allows(used))
    }

    /// Units left, or `None` when nothing bounds usage.
    #[must_use]
    pub fn remaining(&self, used: u64) -> Option<u64> {
        self.limit.and_then(|limit| limit.remaining(used))
    }
}

/// One row of a usage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageLine {
    pub resource: ResourceType,
    pub used: u64,
    pub limit: Option<Limit>,
    pub origin: LimitOrigin,
    pub remaining: Option<u64>,
    pub allowed: bool,
}

impl EntitlementEngine {
    /// The current period in UTC.
    #[must_use]
    pub fn current_period(&self) -> PeriodKey {
        PeriodKey::containing(self.now())
    }

    /// Resolves the limit that applies to the user: their override first,
    /// then the tier's limit, then none.
    pub fn effective_limit(
        &self,
        resource: &ResourceType,
        user_id: UserId,
    ) -> EntitlementResult<EffectiveLimit> {
        let record = self.membership(user_id)?;
        if let Some(limit) = record.as_ref().and_then(|r| r.custom_limit(resource)) {
            return Ok(EffectiveLimit {
                limit: Some(limit),
                origin: LimitOrigin::Custom,
            });
        }

        let tier = record.map_or(Tier::Free, |r| r.tier);
        Ok(match self.policy().limit(tier, resource) {
            Some(limit) => EffectiveLimit {
                limit: Some(limit),
                origin: LimitOrigin::Tier,
            },
            None => EffectiveLimit {
                limit: None,
                origin: LimitOrigin::None,
            },
        })
    }

    /// Whether the user may consume one more unit of `resource` this period.
    ///
    /// Not atomic with [`record_usage`](Self::record_usage): concurrent
    /// callers can both pass before either records. Use
    /// [`try_consume`](Self::try_consume) when overshoot is not acceptable.
    pub fn check_usage_limit(
        &self,
        resource: &ResourceType,
        user_id: UserId,
    ) -> EntitlementResult<bool> {
        let effective = self.effective_limit(resource, user_id)?;
        if effective.limit.is_none_or(|l| l.is_unlimited()) {
            return Ok(true);
        }
        let used = self.current_usage(resource, user_id)?;
        let allowed = effective.allows(used);
        debug!(
            user_id = %user_id,
            resource = %resource,
            used,
            limit = ?effective.limit,
            allowed,
            "usage check"
        );
        Ok(allowed)
    }

    /// Usage of `resource` in the current period.
    ///
    /// Record-counted types read the number of records created this month;
    /// counter types read the monthly counter; other types ask the resolver
    /// and default to 0.
    pub fn current_usage(&self, resource: &ResourceType, user_id: UserId) -> EntitlementResult<u64> {
        let period = self.current_period();
        match resource.source_kind() {
            UsageSourceKind::RecordCount => {
                Ok(self.shared.usage.count_resources(user_id, resource, period)?)
            }
            UsageSourceKind::MonthlyCounter => {
                Ok(self.shared.usage.counter(user_id, resource, period)?)
            }
            UsageSourceKind::External => match &self.shared.resolver {
                Some(resolver) => resolver.current_usage(resource, user_id, period),
                None => Ok(0),
            },
        }
    }

    /// Adds `amount` to the user's counter for this period and returns the
    /// new value. Not gated by the limit.
    pub fn record_usage(
        &self,
        resource: &ResourceType,
        user_id: UserId,
        amount: u64,
    ) -> EntitlementResult<u64> {
        let period = self.current_period();
        let value = self
            .shared
            .usage
            .increment_counter(user_id, resource, period, amount)?;
        debug!(user_id = %user_id, resource = %resource, %period, value, "usage recorded");
        Ok(value)
    }

    /// Records `amount` units against the resource's usage source: new
    /// records for record-counted types, the monthly counter otherwise. Not
    /// gated by the limit.
    pub fn record_consumption(
        &self,
        resource: &ResourceType,
        user_id: UserId,
        amount: u64,
    ) -> EntitlementResult<()> {
        if resource.source_kind() != UsageSourceKind::RecordCount {
            self.record_usage(resource, user_id, amount)?;
            return Ok(());
        }
        let at = self.now();
        for _ in 0..amount {
            self.shared.usage.record_created(user_id, resource, at)?;
        }
        debug!(user_id = %user_id, resource = %resource, amount, "records created");
        Ok(())
    }

    /// Units the user may still consume this period; `None` when unbounded.
    pub fn remaining(&self, resource: &ResourceType, user_id: UserId) -> EntitlementResult<Option<u64>> {
        let effective = self.effective_limit(resource, user_id)?;
        if effective.limit.is_none_or(|l| l.is_unlimited()) {
            return Ok(None);
        }
        let used = self.current_usage(resource, user_id)?;
        Ok(effective.remaining(used))
    }

    /// Records `amount` units only if usage stays within the limit
    /// (`used + amount <= limit`). Returns whether the units were recorded.
    ///
    /// The check and the write are one store operation against the source
    /// [`current_usage`](Self::current_usage) reads: new records for
    /// record-counted types, the monthly counter for counter types. A
    /// bounded limit on an externally measured type fails with
    /// [`EntitlementError::ExternallyMetered`].
    pub fn try_consume(
        &self,
        resource: &ResourceType,
        user_id: UserId,
        amount: u64,
    ) -> EntitlementResult<bool> {
        let limit = self.effective_limit(resource, user_id)?.limit;
        let max = match limit {
            Some(Limit::Count(max)) => max,
            None | Some(Limit::Unlimited) => u64::MAX,
        };

        let consumed = match resource.source_kind() {
            UsageSourceKind::MonthlyCounter => self
                .shared
                .usage
                .increment_counter_within(user_id, resource, self.current_period(), amount, max)?
                .is_some(),
            UsageSourceKind::RecordCount => self
                .shared
                .usage
                .record_created_within(user_id, resource, self.now(), amount, max)?
                .is_some(),
            UsageSourceKind::External => match limit {
                Some(Limit::Count(_)) => {
                    return Err(EntitlementError::ExternallyMetered(resource.clone()));
                }
                None | Some(Limit::Unlimited) => {
                    self.record_usage(resource, user_id, amount)?;
                    true
                }
            },
        };

        if !consumed {
            info!(user_id = %user_id, resource = %resource, amount, max, "Usage refused: limit reached");
        }
        Ok(consumed)
    }

    /// Usage against limits for every resource type the policy table or the
    /// user's overrides mention, built-in types first.
    pub fn usage_report(&self, user_id: UserId) -> EntitlementResult<Vec<UsageLine>> {
        let mut resources: BTreeSet<ResourceType> = self.policy().resource_types();
        if let Some(record) = self.membership(user_id)? {
            resources.extend(record.custom_limits.keys().cloned());
        }

        resources
            .into_iter()
            .map(|resource| {
                let effective = self.effective_limit(&resource, user_id)?;
                let used = self.current_usage(&resource, user_id)?;
                Ok(UsageLine {
                    used,
                    limit: effective.limit,
                    origin: effective.origin,
                    remaining: effective.remaining(used),
                    allowed: effective.allows(used),
                    resource,
                })
            })
            .collect()
    }
}
