//! Shared fixtures for entitlement tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tiergate_entitlement::EntitlementEngine;
use tiergate_policy::TierPolicyTable;
use tiergate_registry::{FeatureModule, ModuleDescriptor, ModuleRegistry};
use tiergate_store::{MembershipStore, MemoryStore, StoreError, StoreResult, UsageStore};
use tiergate_types::{
    MembershipRecord, MembershipStatus, MemoryAuditSink, MemoryEventBus, PeriodKey, ResourceType,
    UserId,
};

/// The instant every test engine believes is "now".
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

pub fn user(id: i64) -> UserId {
    UserId::new(id)
}

pub struct Plain(pub &'static str);

impl FeatureModule for Plain {
    fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor::new(self.0, self.0, format!("{} module", self.0), "1.0.0")
    }
}

pub fn registry_with(ids: &[&'static str]) -> Arc<ModuleRegistry> {
    let registry = ModuleRegistry::default();
    for &id in ids {
        registry.register_module(Arc::new(Plain(id))).unwrap();
    }
    Arc::new(registry)
}

/// Engine over a memory store with recording audit and event collaborators.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ModuleRegistry>,
    pub audit: Arc<MemoryAuditSink>,
    pub bus: Arc<MemoryEventBus>,
    pub engine: EntitlementEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(TierPolicyTable::defaults())
    }

    pub fn with_policy(policy: TierPolicyTable) -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(&["analytics", "podcast", "quiz"]);
        let audit = Arc::new(MemoryAuditSink::new());
        let bus = Arc::new(MemoryEventBus::new());
        let engine = EntitlementEngine::builder(
            store.clone(),
            store.clone(),
            Arc::new(policy),
            registry.clone(),
        )
        .audit(audit.clone())
        .events(bus.clone())
        .clock(Arc::new(now))
        .build();
        Self {
            store,
            registry,
            audit,
            bus,
            engine,
        }
    }
}

/// Memory store that counts membership reads and can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
    pub reads: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl MembershipStore for FlakyStore {
    fn get_membership(&self, user_id: UserId) -> StoreResult<Option<MembershipRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get_membership(user_id)
    }

    fn upsert_membership(&self, record: &MembershipRecord) -> StoreResult<()> {
        self.check()?;
        self.inner.upsert_membership(record)
    }

    fn list_due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<MembershipRecord>> {
        self.check()?;
        self.inner.list_due_for_expiry(now)
    }

    fn transition_status(
        &self,
        user_id: UserId,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> StoreResult<bool> {
        self.check()?;
        self.inner.transition_status(user_id, from, to)
    }
}

impl UsageStore for FlakyStore {
    fn record_created(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check()?;
        self.inner.record_created(user_id, resource, at)
    }

    fn record_created_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        self.check()?;
        self.inner.record_created_within(user_id, resource, at, amount, max)
    }

    fn count_resources(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64> {
        self.check()?;
        self.inner.count_resources(user_id, resource, period)
    }

    fn counter(&self, user_id: UserId, resource: &ResourceType, period: PeriodKey) -> StoreResult<u64> {
        self.check()?;
        self.inner.counter(user_id, resource, period)
    }

    fn increment_counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
    ) -> StoreResult<u64> {
        self.check()?;
        self.inner.increment_counter(user_id, resource, period, amount)
    }

    fn increment_counter_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        self.check()?;
        self.inner
            .increment_counter_within(user_id, resource, period, amount, max)
    }
}
