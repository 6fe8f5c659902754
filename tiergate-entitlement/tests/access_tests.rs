//! Module access by tier.

mod common;

use common::{user, Harness, Plain};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tiergate_entitlement::UpdateOptions;
use tiergate_policy::{AllowedModules, TierPolicy, TierPolicyTable};
use tiergate_registry::ModuleAccess;
use tiergate_types::Tier;

fn ids(modules: Vec<tiergate_registry::RegisteredModule>) -> Vec<String> {
    modules.into_iter().map(|m| m.descriptor.id).collect()
}

#[test]
fn free_tier_gets_no_modules_by_default() {
    let h = Harness::new();
    assert!(!h.engine.can_access_module("quiz", user(1)));
    assert!(h.engine.modules_for_user(user(1)).is_empty());
}

#[test]
fn all_grants_every_registered_module() {
    let h = Harness::new();
    h.engine
        .update_tier(user(1), "gold", UpdateOptions::default())
        .unwrap();
    assert_eq!(
        ids(h.engine.modules_for_user(user(1))),
        vec!["analytics", "podcast", "quiz"]
    );
}

#[test]
fn all_covers_modules_registered_after_policy_load() {
    let h = Harness::new();
    h.engine
        .update_tier(user(1), "platinum", UpdateOptions::default())
        .unwrap();
    assert!(!h.engine.can_access_module("flashcards", user(1)));

    h.registry.register_module(Arc::new(Plain("flashcards"))).unwrap();
    assert!(h.engine.can_access_module("flashcards", user(1)));
}

#[test]
fn unregistered_module_never_accessible() {
    let h = Harness::new();
    h.engine
        .update_tier(user(1), "gold", UpdateOptions::default())
        .unwrap();
    assert!(!h.engine.can_access_module("ghost", user(1)));
}

#[test]
fn explicit_set_grants_only_listed_modules() {
    let policy = TierPolicyTable::with_policies([(
        Tier::Silver,
        TierPolicy::new(AllowedModules::only(["quiz", "ghost"])),
    )]);
    let h = Harness::with_policy(policy);
    h.engine
        .update_tier(user(1), "silver", UpdateOptions::default())
        .unwrap();

    assert!(h.engine.can_access_module("quiz", user(1)));
    assert!(!h.engine.can_access_module("podcast", user(1)));
    // Listed but never registered.
    assert!(!h.engine.can_access_module("ghost", user(1)));
    assert_eq!(ids(h.engine.modules_for_user(user(1))), vec!["quiz"]);
}

#[test]
fn disabled_modules_hidden_from_listing() {
    let h = Harness::new();
    h.engine
        .update_tier(user(1), "gold", UpdateOptions::default())
        .unwrap();
    h.registry.set_enabled("podcast", false).unwrap();
    assert_eq!(
        ids(h.engine.modules_for_user(user(1))),
        vec!["analytics", "quiz"]
    );
}

#[test]
fn engine_serves_registry_listing() {
    let h = Harness::new();
    h.engine
        .update_tier(user(1), "gold", UpdateOptions::default())
        .unwrap();
    let access: &dyn ModuleAccess = &h.engine;
    assert_eq!(h.registry.list_for_user(user(1), access).len(), 3);
    assert!(h.registry.list_for_user(user(2), access).is_empty());
}

#[test]
fn expired_membership_loses_access() {
    let h = Harness::new();
    h.engine
        .update_tier(
            user(1),
            "gold",
            UpdateOptions::expiring_at(common::now() - chrono::Duration::hours(1)),
        )
        .unwrap();
    assert!(h.engine.can_access_module("quiz", user(1)));

    h.engine.sweep_expirations(common::now()).unwrap();
    assert!(!h.engine.can_access_module("quiz", user(1)));
}
