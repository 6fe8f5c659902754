//! Expiration sweep.

use crate::engine::EntitlementEngine;
use crate::error::EntitlementResult;
use chrono::{DateTime, Utc};
use serde_json::json;
use tiergate_types::{EventPayload, MembershipStatus};
use tracing::{debug, info};

impl EntitlementEngine {
    /// Moves every active membership whose expiry is strictly before `now`
    /// to `expired`. Returns how many records this call transitioned.
    ///
    /// Each transition is a compare-and-set in the store, so overlapping or
    /// repeated sweeps transition a record at most once.
    pub fn sweep_expirations(&self, now: DateTime<Utc>) -> EntitlementResult<usize> {
        let due = self.shared.memberships.list_due_for_expiry(now)?;
        debug!(candidates = due.len(), %now, "Sweeping expired memberships");

        let mut expired = 0;
        for record in due {
            let user_id = record.user_id;
            let moved = self.shared.memberships.transition_status(
                user_id,
                MembershipStatus::Active,
                MembershipStatus::Expired,
            )?;
            if !moved {
                debug!(user_id = %user_id, "Membership already transitioned");
                continue;
            }

            self.invalidate(user_id);
            self.audit(
                "membership.expired",
                user_id,
                json!({ "tier": record.tier, "expires_at": record.expires_at }),
            );
            self.publish(EventPayload::MembershipExpired {
                user_id,
                tier: record.tier,
            });
            expired += 1;
        }

        if expired > 0 {
            info!(expired, "Expired memberships");
        }
        Ok(expired)
    }
}
