use pretty_assertions::assert_eq;
use tiergate_policy::{AllowedModules, TierPolicy, TierPolicyTable};
use tiergate_types::{Limit, ResourceType, Tier};

/// Helper: write TOML content to a temp file and load via `load_from`.
fn load_policy_from_str(toml_content: &str) -> (tempfile::TempDir, TierPolicyTable) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiers.toml");
    std::fs::write(&path, toml_content).unwrap();
    let table = TierPolicyTable::load_from(path);
    (dir, table)
}

// ================================================================
// load_from
// ================================================================

#[test]
fn load_from_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let table = TierPolicyTable::load_from(dir.path().join("nope.toml"));
    assert!(!table.has_policy_file());
    assert_eq!(
        table.limit(Tier::Free, &ResourceType::Episodes),
        TierPolicyTable::defaults().limit(Tier::Free, &ResourceType::Episodes)
    );
}

#[test]
fn load_from_file() {
    let (_dir, table) = load_policy_from_str(
        r#"
[tiers.free]
modules = ["quiz", "flashcards"]

[tiers.free.limits]
episodes = 2

[tiers.gold]
modules = "all"

[tiers.gold.limits]
episodes = 100
quiz_attempts = 50
"#,
    );
    assert!(table.has_policy_file());
    assert!(table.policy_path().is_some());
    assert!(table.allows_module(Tier::Free, "flashcards"));
    assert!(!table.allows_module(Tier::Free, "podcast"));
    assert!(table.allows_module(Tier::Gold, "podcast"));
    assert_eq!(
        table.limit(Tier::Gold, &ResourceType::Custom("quiz_attempts".into())),
        Some(Limit::Count(50))
    );
    // Tiers absent from the file are empty, not defaulted.
    assert_eq!(table.policy(Tier::Silver), TierPolicy::default());
}

#[test]
fn load_from_malformed_file_falls_back_to_defaults() {
    let (_dir, table) = load_policy_from_str("this is not valid toml {{{{");
    assert!(table.has_policy_file());
    assert!(table.allows_module(Tier::Gold, "anything"));
    assert_eq!(
        table.limit(Tier::Free, &ResourceType::Episodes),
        Some(Limit::Count(3))
    );
}

#[test]
fn load_from_unknown_tier_falls_back_to_defaults() {
    let (_dir, table) = load_policy_from_str("[tiers.diamond]\nmodules = \"all\"\n");
    assert!(table.allows_module(Tier::Platinum, "x"));
}

#[test]
fn load_from_unreadable_path_falls_back() {
    // A directory exists but cannot be read as a file.
    let dir = tempfile::tempdir().unwrap();
    let table = TierPolicyTable::load_from(dir.path().to_path_buf());
    assert!(table.allows_module(Tier::Gold, "anything"));
}

#[test]
fn try_load_from_surfaces_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiers.toml");
    std::fs::write(&path, "[tiers.gold]\nmodules = 12\n").unwrap();
    assert!(TierPolicyTable::try_load_from(&path).is_err());
    assert!(TierPolicyTable::try_load_from(&dir.path().join("missing.toml")).is_err());
}

// ================================================================
// with_policies
// ================================================================

#[test]
fn explicit_policies() {
    let table = TierPolicyTable::with_policies([(
        Tier::Gold,
        TierPolicy::new(AllowedModules::only(["quiz"]))
            .with_limit(ResourceType::Episodes, Limit::Count(100)),
    )]);
    assert!(table.allows_module(Tier::Gold, "quiz"));
    assert!(!table.allows_module(Tier::Gold, "podcast"));
    assert!(!table.allows_module(Tier::Free, "quiz"));
    assert_eq!(table.limit(Tier::Gold, &ResourceType::Episodes), Some(Limit::Count(100)));
    assert_eq!(table.limit(Tier::Gold, &ResourceType::Exports), None);
}
