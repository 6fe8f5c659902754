//! Store interfaces consumed by the entitlement engine.

use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use tiergate_types::{MembershipRecord, MembershipStatus, PeriodKey, ResourceType, UserId};

/// Persisted membership records, keyed by user id.
///
/// Implementations enforce at most one record per user.
pub trait MembershipStore: Send + Sync {
    /// Returns the user's record regardless of status.
    fn get_membership(&self, user_id: UserId) -> StoreResult<Option<MembershipRecord>>;

    /// Inserts or replaces the user's record.
    fn upsert_membership(&self, record: &MembershipRecord) -> StoreResult<()>;

    /// Active records whose `expires_at` is set and strictly before `now`.
    fn list_due_for_expiry(&self, now: DateTime<Utc>) -> StoreResult<Vec<MembershipRecord>>;

    /// Moves the user's record from `from` to `to` if it is currently in
    /// `from`. Returns `false` when the record is missing or already in a
    /// different status, so concurrent callers transition it at most once.
    fn transition_status(
        &self,
        user_id: UserId,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> StoreResult<bool>;
}

/// Largest value a counter or record count can hold. Increments saturate here.
pub(crate) const MAX_COUNT: u64 = i64::MAX as u64;

/// Usage sources: record counts and monthly counters.
pub trait UsageStore: Send + Sync {
    /// Notes that the user created one `resource` record at `at`.
    fn record_created(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Atomically notes `amount` records created at `at`, only if the count
    /// for the period containing `at` stays within `max`. Returns the new
    /// count, or `None` if nothing was recorded.
    fn record_created_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        at: DateTime<Utc>,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>>;

    /// Number of `resource` records the user created within `period`.
    fn count_resources(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
    ) -> StoreResult<u64>;

    /// Current value of the `(user, resource, period)` counter; 0 if absent.
    fn counter(&self, user_id: UserId, resource: &ResourceType, period: PeriodKey)
    -> StoreResult<u64>;

    /// Adds `amount` to the counter, creating it if needed, saturating at
    /// `i64::MAX`. Returns the new value.
    fn increment_counter(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
    ) -> StoreResult<u64>;

    /// Atomically adds `amount` only if the result stays within `max`
    /// (`current + amount <= max`). Returns the new value, or `None` if the
    /// increment was refused and the counter left unchanged.
    fn increment_counter_within(
        &self,
        user_id: UserId,
        resource: &ResourceType,
        period: PeriodKey,
        amount: u64,
        max: u64,
    ) -> StoreResult<Option<u64>>;
}
