//! Expiration sweep.

mod common;

use chrono::Duration;
use common::{now, user, Harness};
use pretty_assertions::assert_eq;
use tiergate_entitlement::UpdateOptions;
use tiergate_store::MembershipStore;
use tiergate_types::{EventPayload, MembershipStatus, Tier};

fn expiring(h: &Harness, id: i64, tier: &str, offset: Duration) {
    h.engine
        .update_tier(user(id), tier, UpdateOptions::expiring_at(now() + offset))
        .unwrap();
}

#[test]
fn sweep_expires_past_due_memberships_once() {
    let h = Harness::new();
    expiring(&h, 1, "gold", -Duration::days(1));
    expiring(&h, 2, "silver", Duration::days(1));
    h.engine.provision_default(user(3)).unwrap();

    // Warm the cache so the sweep has something to invalidate.
    assert_eq!(h.engine.tier(user(1)), Tier::Gold);

    assert_eq!(h.engine.sweep_expirations(now()).unwrap(), 1);
    assert!(h.engine.membership(user(1)).unwrap().is_none());
    assert_eq!(h.engine.tier(user(1)), Tier::Free);
    assert_eq!(h.engine.tier(user(2)), Tier::Silver);
    assert_eq!(h.engine.tier(user(3)), Tier::Free);

    let stored = h.store.get_membership(user(1)).unwrap().unwrap();
    assert_eq!(stored.status, MembershipStatus::Expired);
    assert_eq!(stored.tier, Tier::Gold);

    assert_eq!(h.engine.sweep_expirations(now()).unwrap(), 0);
    assert_eq!(h.audit.entries_for("membership.expired").len(), 1);
    assert_eq!(
        h.bus.named("membership.expired")[0].payload,
        EventPayload::MembershipExpired {
            user_id: user(1),
            tier: Tier::Gold
        }
    );
}

#[test]
fn expiry_equal_to_now_is_not_due() {
    let h = Harness::new();
    expiring(&h, 1, "gold", Duration::zero());
    assert_eq!(h.engine.sweep_expirations(now()).unwrap(), 0);
    assert_eq!(h.engine.tier(user(1)), Tier::Gold);
}

#[test]
fn non_active_records_are_not_swept() {
    let h = Harness::new();
    expiring(&h, 1, "gold", -Duration::days(3));
    h.engine
        .set_status(user(1), MembershipStatus::Cancelled)
        .unwrap();
    assert_eq!(h.engine.sweep_expirations(now()).unwrap(), 0);
    assert_eq!(
        h.store.get_membership(user(1)).unwrap().unwrap().status,
        MembershipStatus::Cancelled
    );
}

#[test]
fn concurrent_sweeps_transition_each_record_once() {
    let h = Harness::new();
    for id in 1..=20 {
        expiring(&h, id, "bronze", -Duration::minutes(id));
    }

    let total: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = h.engine.scope();
                s.spawn(move || engine.sweep_expirations(now()).unwrap())
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).sum()
    });

    assert_eq!(total, 20);
    assert_eq!(h.audit.entries_for("membership.expired").len(), 20);
    assert_eq!(h.engine.sweep_expirations(now()).unwrap(), 0);
}
