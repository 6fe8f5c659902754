//! Named constructors for manifest-declared modules.
//!
//! A manifest picks its constructor by `kind` (or, when absent, by its file
//! stem). Constructors are registered explicitly by the host before
//! discovery; there is no reflection.

use crate::descriptor::ModuleManifest;
use crate::module::{FeatureModule, ManifestModule};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a module instance from its manifest.
pub type ModuleFactory =
    Arc<dyn Fn(&ModuleManifest) -> Result<Box<dyn FeatureModule>, String> + Send + Sync>;

/// Factory kind for purely declarative modules.
pub const MANIFEST_KIND: &str = "manifest";

/// Factory table keyed by kind.
#[derive(Clone)]
pub struct ModuleFactories {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleFactories {
    /// A table containing only the declarative [`MANIFEST_KIND`] factory.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            factories: HashMap::new(),
        };
        table.register(MANIFEST_KIND, |manifest| {
            Ok(Box::new(ManifestModule::from_manifest(manifest)) as Box<dyn FeatureModule>)
        });
        table
    }

    /// Registers (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ModuleManifest) -> Result<Box<dyn FeatureModule>, String> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn get(&self, kind: &str) -> Option<ModuleFactory> {
        self.factories.get(kind).cloned()
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ModuleFactories {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleFactories")
            .field("kinds", &self.kinds())
            .finish()
    }
}
