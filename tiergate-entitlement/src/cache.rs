//! Per-scope membership read cache.

use std::collections::HashMap;
use std::sync::Mutex;
use tiergate_types::{MembershipRecord, UserId};

/// Caches the store's answer per user, including "no record".
///
/// Entries live until explicitly invalidated. There is no time-based
/// expiry; a cache belongs to one scope and dies with it.
#[derive(Debug, Default)]
pub(crate) struct MembershipCache {
    entries: Mutex<HashMap<UserId, Option<MembershipRecord>>>,
}

impl MembershipCache {
    /// `None` on a miss, `Some(None)` for a cached absent record.
    pub(crate) fn get(&self, user_id: UserId) -> Option<Option<MembershipRecord>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .cloned()
    }

    pub(crate) fn put(&self, user_id: UserId, record: Option<MembershipRecord>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id, record);
    }

    pub(crate) fn invalidate(&self, user_id: UserId) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&user_id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
