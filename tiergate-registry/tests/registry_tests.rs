//! Direct registration, lookup and toggling.

mod common;

use common::TestModule;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tiergate_registry::{
    FeatureModule, ModuleAccess, ModuleDescriptor, ModuleRegistry, RegistryError, ValidationError,
};
use tiergate_types::{EventPayload, MemoryEventBus, UserId};

fn module(id: &str) -> Arc<dyn FeatureModule> {
    Arc::new(TestModule::new(id))
}

#[test]
fn register_and_get() {
    let registry = ModuleRegistry::default();
    registry.register_module(module("quiz")).unwrap();

    let got = registry.get("quiz").unwrap();
    assert_eq!(got.id(), "quiz");
    assert_eq!(got.source, "direct");
    assert!(got.is_enabled());
    assert_eq!(registry.len(), 1);
    assert!(registry.contains("quiz"));
}

#[test]
fn get_unknown_is_not_found() {
    let registry = ModuleRegistry::default();
    assert!(matches!(registry.get("nope"), Err(RegistryError::NotFound(id)) if id == "nope"));
}

#[test]
fn duplicate_registration_keeps_first() {
    let registry = ModuleRegistry::default();
    let first = ModuleDescriptor::new("quiz", "First", "first quiz", "1.0.0");
    let second = ModuleDescriptor::new("quiz", "Second", "second quiz", "2.0.0");

    registry
        .register(first.clone(), Arc::new(TestModule::from_descriptor(first)))
        .unwrap();
    let err = registry
        .register(second.clone(), Arc::new(TestModule::from_descriptor(second)))
        .unwrap_err();

    assert!(matches!(err, RegistryError::DuplicateId(ref id) if id == "quiz"));
    assert_eq!(registry.get("quiz").unwrap().descriptor.name, "First");
    assert_eq!(registry.len(), 1);
}

#[test]
fn invalid_descriptor_rejected() {
    let registry = ModuleRegistry::default();
    let mut descriptor = ModuleDescriptor::new("Quiz Game", "Quiz", "quizzes", "1.0.0");
    let err = registry
        .register(descriptor.clone(), Arc::new(TestModule::from_descriptor(descriptor.clone())))
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation { error: ValidationError::InvalidId(_), .. }
    ));

    descriptor.id = "quiz".into();
    descriptor.data_schema = Some(json!(["title"]));
    let err = registry
        .register(descriptor.clone(), Arc::new(TestModule::from_descriptor(descriptor)))
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation { error: ValidationError::SchemaNotMapping("array"), .. }
    ));
    assert!(registry.is_empty());
}

#[test]
fn list_enabled_excludes_disabled_and_is_sorted() {
    let registry = ModuleRegistry::default();
    for id in ["podcast", "analytics", "quiz"] {
        registry.register_module(module(id)).unwrap();
    }
    registry.set_enabled("podcast", false).unwrap();

    let enabled: Vec<String> = registry.list_enabled().iter().map(|m| m.id().to_string()).collect();
    assert_eq!(enabled, vec!["analytics".to_string(), "quiz".to_string()]);

    let all: Vec<String> = registry.list_all().iter().map(|m| m.id().to_string()).collect();
    assert_eq!(all, vec!["analytics", "podcast", "quiz"]);
}

#[test]
fn set_enabled_only_flips_flag() {
    let bus = Arc::new(MemoryEventBus::new());
    let registry = ModuleRegistry::new(bus.clone());
    registry.register_module(module("quiz")).unwrap();
    let before = registry.get("quiz").unwrap().descriptor;

    registry.set_enabled("quiz", false).unwrap();
    let after = registry.get("quiz").unwrap().descriptor;
    assert!(!after.enabled);
    assert_eq!(ModuleDescriptor { enabled: true, ..after }, before);

    let toggled = bus.named("module.toggled");
    assert_eq!(toggled.len(), 1);
    assert_eq!(
        toggled[0].payload,
        EventPayload::ModuleToggled {
            module_id: "quiz".into(),
            enabled: false
        }
    );
}

#[test]
fn set_enabled_unknown_is_not_found() {
    let registry = ModuleRegistry::default();
    assert!(matches!(
        registry.set_enabled("ghost", true),
        Err(RegistryError::NotFound(_))
    ));
}

#[test]
fn registration_publishes_event() {
    let bus = Arc::new(MemoryEventBus::new());
    let registry = ModuleRegistry::new(bus.clone());
    registry.register_module(module("quiz")).unwrap();

    let events = bus.named("module.registered");
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].payload,
        EventPayload::ModuleRegistered {
            module_id: "quiz".into(),
            source: "direct".into()
        }
    );
}

struct AllowList(HashSet<&'static str>);

impl ModuleAccess for AllowList {
    fn can_access_module(&self, module_id: &str, _user_id: UserId) -> bool {
        self.0.contains(module_id)
    }
}

#[test]
fn list_for_user_filters_by_access() {
    let registry = ModuleRegistry::default();
    for id in ["analytics", "podcast", "quiz"] {
        registry.register_module(module(id)).unwrap();
    }
    registry.set_enabled("quiz", false).unwrap();

    let access = AllowList(["quiz", "podcast"].into_iter().collect());
    let ids: Vec<String> = registry
        .list_for_user(UserId::new(1), &access)
        .iter()
        .map(|m| m.id().to_string())
        .collect();
    assert_eq!(ids, vec!["podcast"]);
}

#[test]
fn module_validates_its_own_input() {
    let registry = ModuleRegistry::default();
    registry.register_module(module("quiz")).unwrap();
    let quiz = registry.get("quiz").unwrap();

    assert!(quiz.instance.validate_input(&json!({"title": "Week 1"})).is_ok());
    assert!(quiz.instance.validate_input(&json!({"title": 3})).is_err());
}
