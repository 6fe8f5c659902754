//! Feature module registry for Tiergate.
//!
//! Modules are discovered from an ordered list of [`ModuleSource`]s, checked
//! against the descriptor contract, and stored by unique id. Discovery is
//! resilient: a broken candidate is recorded in the registry's error list
//! and skipped, never aborting the rest of the batch.
//!
//! Sources are ordered core-first and the first registration of an id wins,
//! so core modules cannot be shadowed by site-level manifests.

mod descriptor;
mod error;
mod factory;
mod module;
mod registry;
mod source;

pub use descriptor::{is_valid_module_id, validate, ModuleDescriptor, ModuleManifest};
pub use error::{RegistryError, RegistryResult, ValidationError};
pub use factory::{ModuleFactories, ModuleFactory, MANIFEST_KIND};
pub use module::{validate_against_schema, FeatureModule, InputError, ManifestModule};
pub use registry::{DiscoveryReport, ModuleAccess, ModuleRegistry, RegisteredModule, SourceHook};
pub use source::{Candidate, ManifestDirSource, ModuleSource, StaticSource};
