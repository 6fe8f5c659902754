//! The module registry: discovery, registration and lookup.
//!
//! Discovery stages every accepted module and commits the batch under a
//! single write lock, so concurrent readers see either the old catalog or
//! the complete new one.

use crate::descriptor::{validate, ModuleDescriptor};
use crate::error::{RegistryError, RegistryResult};
use crate::module::FeatureModule;
use crate::source::ModuleSource;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tiergate_types::{Event, EventBus, EventPayload, NullEventBus, UserId};
use tracing::{debug, info, warn};

/// Answers whether a user may use a module. Implemented by the entitlement
/// engine.
pub trait ModuleAccess {
    fn can_access_module(&self, module_id: &str, user_id: UserId) -> bool;
}

/// Callback that may add, remove or reorder sources before discovery.
pub type SourceHook = Arc<dyn Fn(&mut Vec<Box<dyn ModuleSource>>) + Send + Sync>;

/// A registered module: its descriptor, live instance and origin.
#[derive(Clone)]
pub struct RegisteredModule {
    pub descriptor: ModuleDescriptor,
    pub instance: Arc<dyn FeatureModule>,
    /// Name of the source that contributed the module.
    pub source: String,
}

impl RegisteredModule {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.descriptor.enabled
    }
}

impl std::fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("descriptor", &self.descriptor)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Outcome of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Ids registered by this run, in discovery order.
    pub registered: Vec<String>,
    /// Errors recorded by this run, in discovery order.
    pub errors: Vec<String>,
}

#[derive(Default)]
struct RegistryState {
    modules: BTreeMap<String, RegisteredModule>,
    errors: Vec<String>,
}

/// Registry of feature modules keyed by unique id.
pub struct ModuleRegistry {
    state: RwLock<RegistryState>,
    hooks: Mutex<Vec<SourceHook>>,
    bus: Arc<dyn EventBus>,
}

impl ModuleRegistry {
    /// Creates an empty registry publishing to `bus`.
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            hooks: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Registry that publishes nowhere.
    #[must_use]
    pub fn without_events() -> Self {
        Self::new(Arc::new(NullEventBus))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        // Writers only commit fully built state, so a poisoned lock still
        // holds a consistent catalog.
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ================================================================
    // Discovery
    // ================================================================

    /// Registers a hook run against the source list before each discovery.
    /// A hook added while discovery runs takes effect from the next one.
    pub fn add_source_hook<F>(&self, hook: F)
    where
        F: Fn(&mut Vec<Box<dyn ModuleSource>>) + Send + Sync + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(hook));
    }

    /// Discovers modules from `sources`, in order.
    ///
    /// Failures for one source or candidate are recorded and skipped. The
    /// first module to claim an id wins, both against modules already in the
    /// registry and within this batch.
    pub fn discover(&self, mut sources: Vec<Box<dyn ModuleSource>>) -> DiscoveryReport {
        let hooks: Vec<SourceHook> = self
            .hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for hook in &hooks {
            hook(&mut sources);
        }

        let taken: HashSet<String> = self.read().modules.keys().cloned().collect();
        let mut staged: Vec<RegisteredModule> = Vec::new();
        let mut staged_ids: HashSet<String> = HashSet::new();
        let mut errors: Vec<String> = Vec::new();

        for source in &sources {
            let source_name = source.name().to_string();
            let candidates = match source.candidates() {
                Ok(candidates) => candidates,
                Err(e) => {
                    let err = RegistryError::Source {
                        source_name: source_name.clone(),
                        message: e.to_string(),
                    };
                    warn!(source = %source_name, "Module source skipped: {}", err);
                    errors.push(err.to_string());
                    continue;
                }
            };
            debug!(source = %source_name, count = candidates.len(), "Listing module candidates");

            for candidate in candidates {
                let label = candidate.label().to_string();
                match prepare(candidate, &source_name) {
                    Ok(module) => {
                        let id = module.descriptor.id.clone();
                        if taken.contains(&id) || staged_ids.contains(&id) {
                            let err = RegistryError::DuplicateId(id.clone());
                            warn!(module_id = %id, source = %source_name, "Module skipped: {}", err);
                            errors.push(format!("{source_name}: {label}: {err}"));
                            continue;
                        }
                        staged_ids.insert(id);
                        staged.push(module);
                    }
                    Err(err) => {
                        warn!(source = %source_name, candidate = %label, "Module skipped: {}", err);
                        errors.push(format!("{source_name}: {label}: {err}"));
                    }
                }
            }
        }

        let mut registered = Vec::with_capacity(staged.len());
        {
            let mut state = self.write();
            for module in staged {
                let id = module.descriptor.id.clone();
                // Direct registrations may have raced with this batch.
                if state.modules.contains_key(&id) {
                    errors.push(format!("{}: {}", module.source, RegistryError::DuplicateId(id)));
                    continue;
                }
                registered.push((id.clone(), module.source.clone()));
                state.modules.insert(id, module);
            }
            state.errors.extend(errors.iter().cloned());
        }

        for (id, source) in &registered {
            info!(module_id = %id, source = %source, "Module registered");
            self.publish_registered(id, source);
        }
        info!(
            registered = registered.len(),
            errors = errors.len(),
            "Module discovery complete"
        );

        DiscoveryReport {
            registered: registered.into_iter().map(|(id, _)| id).collect(),
            errors,
        }
    }

    // ================================================================
    // Registration
    // ================================================================

    /// Checks a descriptor against the module contract.
    pub fn validate(descriptor: &ModuleDescriptor) -> RegistryResult<()> {
        validate(descriptor).map_err(|e| RegistryError::validation(&descriptor.id, e))
    }

    /// Registers a module. Fails with `DuplicateId` if the id is taken; the
    /// existing entry is never replaced.
    pub fn register(
        &self,
        descriptor: ModuleDescriptor,
        instance: Arc<dyn FeatureModule>,
    ) -> RegistryResult<()> {
        self.register_from("direct", descriptor, instance)
    }

    /// Registers a module using the instance's own descriptor.
    pub fn register_module(&self, instance: Arc<dyn FeatureModule>) -> RegistryResult<()> {
        let descriptor = instance.descriptor();
        self.register(descriptor, instance)
    }

    /// Registers a module, recording `source` as its origin.
    pub fn register_from(
        &self,
        source: &str,
        descriptor: ModuleDescriptor,
        instance: Arc<dyn FeatureModule>,
    ) -> RegistryResult<()> {
        Self::validate(&descriptor)?;
        let id = descriptor.id.clone();
        {
            let mut state = self.write();
            if state.modules.contains_key(&id) {
                return Err(RegistryError::DuplicateId(id));
            }
            state.modules.insert(
                id.clone(),
                RegisteredModule {
                    descriptor,
                    instance,
                    source: source.to_string(),
                },
            );
        }
        info!(module_id = %id, source, "Module registered");
        self.publish_registered(&id, source);
        Ok(())
    }

    fn publish_registered(&self, module_id: &str, source: &str) {
        self.bus.publish(Event::new(EventPayload::ModuleRegistered {
            module_id: module_id.to_string(),
            source: source.to_string(),
        }));
    }

    // ================================================================
    // Lookup
    // ================================================================

    pub fn get(&self, module_id: &str) -> RegistryResult<RegisteredModule> {
        self.read()
            .modules
            .get(module_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(module_id.to_string()))
    }

    #[must_use]
    pub fn contains(&self, module_id: &str) -> bool {
        self.read().modules.contains_key(module_id)
    }

    /// Name of the source that registered `module_id`.
    pub fn source_of(&self, module_id: &str) -> RegistryResult<String> {
        self.get(module_id).map(|m| m.source)
    }

    /// Every registered module, ordered by id.
    pub fn list_all(&self) -> Vec<RegisteredModule> {
        self.read().modules.values().cloned().collect()
    }

    /// Enabled modules, ordered by id.
    pub fn list_enabled(&self) -> Vec<RegisteredModule> {
        self.read()
            .modules
            .values()
            .filter(|m| m.descriptor.enabled)
            .cloned()
            .collect()
    }

    /// Enabled modules the user may access according to `access`.
    pub fn list_for_user(&self, user_id: UserId, access: &dyn ModuleAccess) -> Vec<RegisteredModule> {
        // Snapshot first: `access` reads the registry too.
        self.list_enabled()
            .into_iter()
            .filter(|m| access.can_access_module(m.id(), user_id))
            .collect()
    }

    /// Flips a module's enabled flag. No other state changes.
    pub fn set_enabled(&self, module_id: &str, enabled: bool) -> RegistryResult<()> {
        {
            let mut state = self.write();
            let module = state
                .modules
                .get_mut(module_id)
                .ok_or_else(|| RegistryError::NotFound(module_id.to_string()))?;
            module.descriptor.enabled = enabled;
        }
        info!(module_id, enabled, "Module toggled");
        self.bus.publish(Event::new(EventPayload::ModuleToggled {
            module_id: module_id.to_string(),
            enabled,
        }));
        Ok(())
    }

    /// Every error recorded by discovery so far, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.read().errors.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().modules.is_empty()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::without_events()
    }
}

/// Instantiates and validates one candidate.
fn prepare(candidate: crate::source::Candidate, source: &str) -> RegistryResult<RegisteredModule> {
    let label = candidate.label().to_string();
    let instance = catch_unwind(AssertUnwindSafe(|| candidate.instantiate())).unwrap_or_else(|_| {
        Err(RegistryError::instantiation(&label, "constructor panicked"))
    })?;

    let descriptor = instance.descriptor();
    validate(&descriptor).map_err(|e| RegistryError::validation(&label, e))?;

    Ok(RegisteredModule {
        descriptor,
        instance: Arc::from(instance),
        source: source.to_string(),
    })
}
