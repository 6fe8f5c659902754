//! Tier policy table: reads `~/.tiergate/tiers.toml` and answers
//! per-tier limit and module-access questions.

use crate::error::{PolicyError, PolicyResult};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use tiergate_types::{Limit, ResourceType, Tier};
use tracing::{debug, info, warn};

/// Modules a tier may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedModules {
    /// Every registered module, including ones registered after the policy
    /// was loaded.
    All,
    /// Only the listed module ids.
    Only(BTreeSet<String>),
}

impl AllowedModules {
    #[must_use]
    pub fn none() -> Self {
        Self::Only(BTreeSet::new())
    }

    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }

    /// Returns true if `module_id` is covered by this set.
    #[must_use]
    pub fn contains(&self, module_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(module_id),
        }
    }
}

impl Default for AllowedModules {
    fn default() -> Self {
        Self::none()
    }
}

impl Serialize for AllowedModules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Only(ids) => ids.serialize(serializer),
        }
    }
}

struct AllowedModulesVisitor;

impl<'de> Visitor<'de> for AllowedModulesVisitor {
    type Value = AllowedModules;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"all\" or a list of module ids")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<AllowedModules, E> {
        if v.eq_ignore_ascii_case("all") {
            Ok(AllowedModules::All)
        } else {
            Err(E::custom(format!("expected \"all\", got {v:?}")))
        }
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<AllowedModules, A::Error> {
        let mut ids = BTreeSet::new();
        while let Some(id) = seq.next_element::<String>()? {
            ids.insert(id);
        }
        Ok(AllowedModules::Only(ids))
    }
}

impl<'de> Deserialize<'de> for AllowedModules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AllowedModulesVisitor)
    }
}

/// Limits and module access for one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    #[serde(default)]
    pub resource_limits: BTreeMap<ResourceType, Limit>,
    #[serde(default)]
    pub allowed_modules: AllowedModules,
}

impl TierPolicy {
    #[must_use]
    pub fn new(allowed_modules: AllowedModules) -> Self {
        Self {
            resource_limits: BTreeMap::new(),
            allowed_modules,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, resource: ResourceType, limit: Limit) -> Self {
        self.resource_limits.insert(resource, limit);
        self
    }

    /// The tier-wide limit for `resource`, if one is configured.
    #[must_use]
    pub fn limit(&self, resource: &ResourceType) -> Option<Limit> {
        self.resource_limits.get(resource).copied()
    }
}

/// Per-tier policies, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct TierPolicyTable {
    tiers: HashMap<Tier, TierPolicy>,
    policy_path: Option<PathBuf>,
}

impl TierPolicyTable {
    /// Loads the table from `~/.tiergate/tiers.toml` if it exists.
    /// Falls back to the built-in defaults with a warning on parse errors.
    pub fn load() -> Self {
        Self::load_from(default_policy_path())
    }

    /// Loads the table from an explicit path, falling back to defaults.
    pub fn load_from(policy_path: PathBuf) -> Self {
        if !policy_path.exists() {
            info!("No tier policy found at {:?}, using built-in defaults", policy_path);
            return Self::defaults();
        }

        match Self::try_load_from(&policy_path) {
            Ok(table) => {
                info!("Loaded tier policy from {:?}", policy_path);
                table
            }
            Err(e) => {
                warn!(
                    "Failed to load tier policy {:?}: {}. Falling back to built-in defaults.",
                    policy_path, e
                );
                Self {
                    policy_path: Some(policy_path),
                    ..Self::defaults()
                }
            }
        }
    }

    /// Loads the table from `path`, returning any read or parse error.
    pub fn try_load_from(path: &Path) -> PolicyResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut table = Self::parse(&contents)?;
        table.policy_path = Some(path.to_path_buf());
        Ok(table)
    }

    /// Parses a `tiers.toml` document.
    ///
    /// Tiers missing from the document get an empty policy: no modules and
    /// no limits.
    pub fn parse(contents: &str) -> PolicyResult<Self> {
        let file: PolicyFile = toml::from_str(contents)?;
        file.into_table()
    }

    /// Creates a table from explicit policies (for tests and embedding).
    pub fn with_policies<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = (Tier, TierPolicy)>,
    {
        Self {
            tiers: policies.into_iter().collect(),
            policy_path: None,
        }
    }

    /// The built-in policy used when no policy file is configured.
    #[must_use]
    pub fn defaults() -> Self {
        use Limit::{Count, Unlimited};
        use ResourceType::{AiGenerations, Episodes, Exports};

        let tiered = |episodes, exports, ai, modules| {
            TierPolicy::new(modules)
                .with_limit(Episodes, episodes)
                .with_limit(Exports, exports)
                .with_limit(AiGenerations, ai)
        };

        Self::with_policies([
            (Tier::Free, tiered(Count(3), Count(1), Count(0), AllowedModules::none())),
            (Tier::Bronze, tiered(Count(10), Count(5), Count(20), AllowedModules::none())),
            (Tier::Silver, tiered(Count(25), Count(20), Count(100), AllowedModules::none())),
            (Tier::Gold, tiered(Count(100), Unlimited, Count(500), AllowedModules::All)),
            (Tier::Platinum, tiered(Unlimited, Unlimited, Unlimited, AllowedModules::All)),
            (Tier::Custom, TierPolicy::new(AllowedModules::All)),
        ])
    }

    /// The policy for `tier`; an empty policy if the tier is not configured.
    #[must_use]
    pub fn policy(&self, tier: Tier) -> TierPolicy {
        self.tiers.get(&tier).cloned().unwrap_or_default()
    }

    /// The tier-wide limit for `resource`.
    #[must_use]
    pub fn limit(&self, tier: Tier, resource: &ResourceType) -> Option<Limit> {
        self.tiers.get(&tier).and_then(|p| p.limit(resource))
    }

    /// Returns true if `tier`'s allowed-module set covers `module_id`.
    /// Registry membership is checked by the caller.
    #[must_use]
    pub fn allows_module(&self, tier: Tier, module_id: &str) -> bool {
        let allowed = self
            .tiers
            .get(&tier)
            .is_some_and(|p| p.allowed_modules.contains(module_id));
        debug!(tier = %tier, module_id, allowed, "tier module check");
        allowed
    }

    /// Resource types with a configured limit in any tier.
    #[must_use]
    pub fn resource_types(&self) -> BTreeSet<ResourceType> {
        self.tiers
            .values()
            .flat_map(|p| p.resource_limits.keys().cloned())
            .collect()
    }

    /// Returns whether the table came from a policy file.
    pub fn has_policy_file(&self) -> bool {
        self.policy_path.is_some()
    }

    /// Path the table was loaded from, if any.
    pub fn policy_path(&self) -> Option<&Path> {
        self.policy_path.as_deref()
    }
}

impl Default for TierPolicyTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Raw TOML structure matching the tiers.toml format.
#[derive(Deserialize, Default)]
struct PolicyFile {
    #[serde(default)]
    tiers: BTreeMap<String, TierSection>,
}

#[derive(Deserialize, Default)]
struct TierSection {
    #[serde(default)]
    modules: AllowedModules,
    #[serde(default)]
    limits: BTreeMap<String, Limit>,
}

impl PolicyFile {
    fn into_table(self) -> PolicyResult<TierPolicyTable> {
        let mut tiers = HashMap::new();
        for (name, section) in self.tiers {
            let tier: Tier = name
                .parse()
                .map_err(|_| PolicyError::UnknownTier(name.clone()))?;

            let mut resource_limits = BTreeMap::new();
            for (resource, limit) in section.limits {
                let resource_type: ResourceType =
                    resource.parse().map_err(|_| PolicyError::InvalidResource {
                        tier: name.clone(),
                        name: resource.clone(),
                    })?;
                resource_limits.insert(resource_type, limit);
            }

            tiers.insert(
                tier,
                TierPolicy {
                    resource_limits,
                    allowed_modules: section.modules,
                },
            );
        }

        Ok(TierPolicyTable {
            tiers,
            policy_path: None,
        })
    }
}

/// Resolve the default policy file location.
///
/// `TIERGATE_HOME` wins; otherwise `~/.tiergate/tiers.toml`.
pub fn default_policy_path() -> PathBuf {
    config_dir().join("tiers.toml")
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TIERGATE_HOME") {
        PathBuf::from(dir)
    } else if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".tiergate")
    } else if let Ok(home) = std::env::var("USERPROFILE") {
        Path::new(&home).join(".tiergate")
    } else {
        PathBuf::from(".tiergate")
    }
}
