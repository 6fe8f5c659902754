//! Membership resolution, tier changes and module access.

use crate::cache::MembershipCache;
use crate::error::{EntitlementError, EntitlementResult};
use crate::usage::UsageResolver;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tiergate_policy::TierPolicyTable;
use tiergate_registry::{ModuleAccess, ModuleRegistry, RegisteredModule};
use tiergate_store::{MembershipStore, UsageStore};
use tiergate_types::{
    AuditEntry, AuditSink, CustomLimits, Event, EventBus, EventPayload, MembershipRecord,
    MembershipStatus, NullAuditSink, NullEventBus, Tier, UserId,
};
use tracing::{debug, info, warn};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Optional fields applied by a tier change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub expires_at: Option<DateTime<Utc>>,
    /// Replaces the user's overrides when set.
    pub custom_limits: Option<CustomLimits>,
    pub provider_customer_ref: Option<String>,
    pub provider_subscription_ref: Option<String>,
}

impl UpdateOptions {
    #[must_use]
    pub fn expiring_at(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_custom_limits(mut self, limits: CustomLimits) -> Self {
        self.custom_limits = Some(limits);
        self
    }
}

/// Collaborators shared by every scope of one engine.
pub(crate) struct Shared {
    pub(crate) memberships: Arc<dyn MembershipStore>,
    pub(crate) usage: Arc<dyn UsageStore>,
    pub(crate) policy: Arc<TierPolicyTable>,
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) bus: Arc<dyn EventBus>,
    pub(crate) resolver: Option<Arc<dyn UsageResolver>>,
    pub(crate) clock: Clock,
}

/// Builds an [`EntitlementEngine`]. Audit and events default to no-ops.
pub struct EngineBuilder {
    memberships: Arc<dyn MembershipStore>,
    usage: Arc<dyn UsageStore>,
    policy: Arc<TierPolicyTable>,
    registry: Arc<ModuleRegistry>,
    audit: Arc<dyn AuditSink>,
    bus: Arc<dyn EventBus>,
    resolver: Option<Arc<dyn UsageResolver>>,
    clock: Clock,
}

impl EngineBuilder {
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn events(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Resolver for resource types without a built-in usage source.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn UsageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn build(self) -> EntitlementEngine {
        EntitlementEngine {
            shared: Arc::new(Shared {
                memberships: self.memberships,
                usage: self.usage,
                policy: self.policy,
                registry: self.registry,
                audit: self.audit,
                bus: self.bus,
                resolver: self.resolver,
                clock: self.clock,
            }),
            cache: MembershipCache::default(),
        }
    }
}

/// Decides module access and usage limits for users.
pub struct EntitlementEngine {
    pub(crate) shared: Arc<Shared>,
    cache: MembershipCache,
}

impl EntitlementEngine {
    /// Starts building an engine over separate membership and usage stores.
    pub fn builder(
        memberships: Arc<dyn MembershipStore>,
        usage: Arc<dyn UsageStore>,
        policy: Arc<TierPolicyTable>,
        registry: Arc<ModuleRegistry>,
    ) -> EngineBuilder {
        EngineBuilder {
            memberships,
            usage,
            policy,
            registry,
            audit: Arc::new(NullAuditSink),
            bus: Arc::new(NullEventBus),
            resolver: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Engine over one store that serves both memberships and usage.
    pub fn new<S>(store: Arc<S>, policy: Arc<TierPolicyTable>, registry: Arc<ModuleRegistry>) -> Self
    where
        S: MembershipStore + UsageStore + 'static,
    {
        Self::builder(store.clone(), store, policy, registry).build()
    }

    /// A fresh engine sharing every collaborator but with an empty
    /// membership cache. Use one per request.
    #[must_use]
    pub fn scope(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            cache: MembershipCache::default(),
        }
    }

    pub fn policy(&self) -> &TierPolicyTable {
        &self.shared.policy
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.shared.registry
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.shared.clock)()
    }

    /// Number of users with a cached read in this scope.
    #[must_use]
    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }

    // ================================================================
    // Membership reads
    // ================================================================

    /// The user's record in any status, read through the scope cache.
    fn load_record(&self, user_id: UserId) -> EntitlementResult<Option<MembershipRecord>> {
        if let Some(cached) = self.cache.get(user_id) {
            return Ok(cached);
        }
        let record = self.shared.memberships.get_membership(user_id)?;
        self.cache.put(user_id, record.clone());
        Ok(record)
    }

    /// The user's active membership. Expired, cancelled and suspended
    /// records are treated as absent.
    pub fn membership(&self, user_id: UserId) -> EntitlementResult<Option<MembershipRecord>> {
        Ok(self.load_record(user_id)?.filter(MembershipRecord::is_active))
    }

    /// The user's effective tier: the active membership's tier, else free.
    ///
    /// Never fails. A store failure is logged and resolves to free.
    pub fn tier(&self, user_id: UserId) -> Tier {
        match self.membership(user_id) {
            Ok(Some(record)) => record.tier,
            Ok(None) => Tier::Free,
            Err(e) => {
                warn!(user_id = %user_id, "Membership lookup failed, using free tier: {}", e);
                Tier::Free
            }
        }
    }

    // ================================================================
    // Membership mutations
    // ================================================================

    /// Changes the user's tier, given by name.
    ///
    /// Fails with `InvalidTier` for an unknown name, leaving the membership
    /// unchanged.
    pub fn update_tier(
        &self,
        user_id: UserId,
        tier: &str,
        options: UpdateOptions,
    ) -> EntitlementResult<()> {
        let tier: Tier = tier
            .parse()
            .map_err(|_| EntitlementError::InvalidTier(tier.to_string()))?;
        self.assign_tier(user_id, tier, options)
    }

    /// Changes the user's tier.
    ///
    /// Provisions an active record starting now if the user has none;
    /// otherwise updates the tier and any given options and leaves the
    /// status alone.
    pub fn assign_tier(
        &self,
        user_id: UserId,
        tier: Tier,
        options: UpdateOptions,
    ) -> EntitlementResult<()> {
        let existing = self.shared.memberships.get_membership(user_id)?;
        let old_tier = existing.as_ref().map(|r| r.tier);

        let mut record =
            existing.unwrap_or_else(|| MembershipRecord::new(user_id, tier, self.now()));
        record.tier = tier;
        if let Some(expires_at) = options.expires_at {
            record.expires_at = Some(expires_at);
        }
        if let Some(limits) = options.custom_limits {
            record.custom_limits = limits;
        }
        if let Some(customer) = options.provider_customer_ref {
            record.provider_customer_ref = Some(customer);
        }
        if let Some(subscription) = options.provider_subscription_ref {
            record.provider_subscription_ref = Some(subscription);
        }

        self.shared.memberships.upsert_membership(&record)?;
        self.cache.invalidate(user_id);

        info!(
            user_id = %user_id,
            old_tier = ?old_tier,
            new_tier = %tier,
            "Membership tier changed"
        );
        self.audit(
            "membership.tier_changed",
            user_id,
            json!({
                "old_tier": old_tier,
                "new_tier": tier,
                "expires_at": record.expires_at,
            }),
        );
        self.publish(EventPayload::MembershipChanged {
            user_id,
            old_tier,
            new_tier: tier,
        });
        Ok(())
    }

    /// Sets the membership status, e.g. on a cancellation or reactivation
    /// from billing. Fails with `NotFound` if the user has no record.
    pub fn set_status(&self, user_id: UserId, status: MembershipStatus) -> EntitlementResult<()> {
        let mut record = self
            .shared
            .memberships
            .get_membership(user_id)?
            .ok_or(EntitlementError::NotFound(user_id))?;
        let old_status = record.status;
        if old_status == status {
            debug!(user_id = %user_id, status = %status.as_str(), "Membership status unchanged");
            return Ok(());
        }

        record.status = status;
        self.shared.memberships.upsert_membership(&record)?;
        self.cache.invalidate(user_id);

        info!(
            user_id = %user_id,
            old_status = %old_status.as_str(),
            new_status = %status.as_str(),
            "Membership status changed"
        );
        self.audit(
            "membership.status_changed",
            user_id,
            json!({ "old_status": old_status, "new_status": status }),
        );
        self.publish(EventPayload::MembershipStatusChanged {
            user_id,
            old_status,
            new_status: status,
        });
        Ok(())
    }

    /// Creates the free-tier record a new user starts with. Does nothing if
    /// the user already has a record in any status. Returns whether a record
    /// was created.
    pub fn provision_default(&self, user_id: UserId) -> EntitlementResult<bool> {
        if self.shared.memberships.get_membership(user_id)?.is_some() {
            return Ok(false);
        }
        let record = MembershipRecord::new(user_id, Tier::Free, self.now());
        self.shared.memberships.upsert_membership(&record)?;
        self.cache.invalidate(user_id);

        info!(user_id = %user_id, "Provisioned free membership");
        self.audit(
            "membership.provisioned",
            user_id,
            json!({ "tier": Tier::Free }),
        );
        self.publish(EventPayload::MembershipChanged {
            user_id,
            old_tier: None,
            new_tier: Tier::Free,
        });
        Ok(true)
    }

    pub(crate) fn invalidate(&self, user_id: UserId) {
        self.cache.invalidate(user_id);
    }

    pub(crate) fn audit(&self, action: &str, user_id: UserId, details: serde_json::Value) {
        self.shared.audit.append(AuditEntry::new(
            action,
            "membership",
            user_id.to_string(),
            details,
        ));
    }

    pub(crate) fn publish(&self, payload: EventPayload) {
        self.shared.bus.publish(Event::new(payload));
    }

    // ================================================================
    // Module access
    // ================================================================

    /// Whether the user's tier grants `module_id`. Unregistered modules are
    /// never accessible.
    pub fn can_access_module(&self, module_id: &str, user_id: UserId) -> bool {
        if !self.shared.registry.contains(module_id) {
            debug!(module_id, user_id = %user_id, "Access denied: module not registered");
            return false;
        }
        let tier = self.tier(user_id);
        self.shared.policy.allows_module(tier, module_id)
    }

    /// Enabled modules the user may access, ordered by id.
    pub fn modules_for_user(&self, user_id: UserId) -> Vec<RegisteredModule> {
        self.shared.registry.list_for_user(user_id, self)
    }
}

impl ModuleAccess for EntitlementEngine {
    fn can_access_module(&self, module_id: &str, user_id: UserId) -> bool {
        EntitlementEngine::can_access_module(self, module_id, user_id)
    }
}
