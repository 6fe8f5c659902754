//! Shared test helpers for store tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use tiergate_types::{MembershipRecord, Tier, UserId};

/// A fixed instant in the middle of March 2024.
pub fn mid_march() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

pub fn record(user: i64, tier: Tier) -> MembershipRecord {
    MembershipRecord::new(UserId::new(user), tier, mid_march())
}
