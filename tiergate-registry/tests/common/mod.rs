//! Shared test modules and sources for registry tests.

#![allow(dead_code)]

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tiergate_registry::{
    Candidate, FeatureModule, ModuleDescriptor, ModuleSource, RegistryError, RegistryResult,
    StaticSource,
};

/// A module whose descriptor is fixed at construction.
pub struct TestModule {
    descriptor: ModuleDescriptor,
}

impl TestModule {
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(id, id.to_uppercase(), format!("{id} module"), "1.0.0")
                .with_schema(json!({"title": {"type": "string", "required": true}})),
        }
    }

    pub fn from_descriptor(descriptor: ModuleDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn boxed(id: &str) -> Box<dyn FeatureModule> {
        Box::new(Self::new(id))
    }
}

impl FeatureModule for TestModule {
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }
}

/// Static source offering one well-formed module per id.
pub fn static_source(name: &str, ids: &[&str]) -> StaticSource {
    ids.iter().fold(StaticSource::new(name), |source, id| {
        let id = id.to_string();
        source.with(id.clone(), move || Ok(TestModule::boxed(&id)))
    })
}

/// A source whose listing always fails.
pub struct BrokenSource;

impl ModuleSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn candidates(&self) -> RegistryResult<Vec<Candidate>> {
        Err(RegistryError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )))
    }
}

/// Counts how often its modules are constructed.
pub struct CountingSource {
    pub built: Arc<AtomicUsize>,
    ids: Vec<String>,
}

impl CountingSource {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            built: Arc::new(AtomicUsize::new(0)),
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ModuleSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    fn candidates(&self) -> RegistryResult<Vec<Candidate>> {
        Ok(self
            .ids
            .iter()
            .map(|id| {
                let id = id.clone();
                let built = Arc::clone(&self.built);
                Candidate::new(id.clone(), move || {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok(TestModule::boxed(&id))
                })
            })
            .collect())
    }
}
