//! In-memory store.

use crate::error::{StoreError, StoreResult};
use crate::traits::{MembershipStore, UsageStore, MAX_COUNT};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tiergate_types::{MembershipRecord, MembershipStatus, PeriodKey, ResourceType, UserId};

type CounterKey = (UserId, ResourceType, PeriodKey);

#[derive(Debug, Default)]
struct Inner {
    memberships: HashMap<UserId, MembershipRecord>,
    counters: HashMap<CounterKey, u64>,
    /// Creation timestamps of counted resources, per user and type.
    records: HashMap<(UserId, ResourceType), Vec<DateTime<Utc>>>,
}

/// Store that keeps everything in process memory behind one mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl MembershipStore for MemoryStore {
    fn get_membership(&self, user_id: UserId) -> StoreResult<Option<MembershipRecord>> {
        Ok(self.lock()?.memberships.get(&user_id).cloned())
    }

    fn upsert_membership(&self, record: &MembershipRecord) -> StoreResult<()> {
        self.lock()?
            .memberships
            .insert(record.user_id, record.clone());
        Ok(())
    }

    fn list_due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<MembershipRecord>> {
        let inner = self.lock()?;
        let mut due: Vec<MembershipRecord> = inner
            .memberships
            .values()
            .filter(|r| r.is_due_for_expiry(now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.user_id);
        Ok(due)
    }

    fn transition_status(
        &self,
        user_id: UserId,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        match inner.memberships.get_mut(&user_id) {
            Some(record) if record.status == from => {
                record.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl UsageStore for MemoryStore {
    fn record_created(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.lock()?
            .records
            .entry((user_id, resource.clone()))
            .or_default()
            .push(at);
        Ok(())
    }

    fn record_created_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        let period = PeriodKey::containing(at);
        let mut inner = self.lock()?;
        let times = inner.records.entry((user_id, resource.clone())).or_default();
        let current = times.iter().filter(|t| period.contains(**t)).count() as u64;
        match current.checked_add(amount) {
            Some(next) if next <= max.min(MAX_COUNT) => {
                times.extend(std::iter::repeat_n(at, amount as usize));
                Ok(Some(next))
            }
            _ => Ok(None),
        }
    }

    fn count_resources(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64> {
        let inner = self.lock()?;
        let count = inner
            .records
            .get(&(user_id, resource.clone()))
            .map(|times| times.iter().filter(|t| period.contains(**t)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    fn counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64> {
        Ok(self
            .lock()?
            .counters
            .get(&(user_id, resource.clone(), period))
            .copied()
            .unwrap_or(0))
    }

    fn increment_counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
    ) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let value = inner
            .counters
            .entry((user_id, resource.clone(), period))
            .or_insert(0);
        *value = value.saturating_add(amount).min(MAX_COUNT);
        Ok(*value)
    }

    fn increment_counter_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>> {
        let mut inner = self.lock()?;
        let key = (user_id, resource.clone(), period);
        let current = inner.counters.get(&key).copied().unwrap_or(0);
        match current.checked_add(amount) {
            Some(next) if next <= max.min(MAX_COUNT) => {
                inner.counters.insert(key, next);
                Ok(Some(next))
            }
            _ => Ok(None),
        }
    }
}
