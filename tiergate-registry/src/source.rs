//! Module sources: where discovery finds candidate modules.

use crate::descriptor::ModuleManifest;
use crate::error::{RegistryError, RegistryResult};
use crate::factory::ModuleFactories;
use crate::module::FeatureModule;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type Instantiate = Box<dyn FnOnce() -> RegistryResult<Box<dyn FeatureModule>> + Send>;

/// A module a source offers for registration, not yet constructed.
pub struct Candidate {
    label: String,
    instantiate: Instantiate,
}

impl Candidate {
    pub fn new<F>(label: impl Into<String>, instantiate: F) -> Self
    where
        F: FnOnce() -> RegistryResult<Box<dyn FeatureModule>> + Send + 'static,
    {
        Self {
            label: label.into(),
            instantiate: Box::new(instantiate),
        }
    }

    /// Human-readable name used in error messages (file name, constructor
    /// name).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Constructs the module.
    pub fn instantiate(self) -> RegistryResult<Box<dyn FeatureModule>> {
        (self.instantiate)()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate").field("label", &self.label).finish()
    }
}

/// An ordered location that contributes modules.
pub trait ModuleSource: Send + Sync {
    /// Name recorded against registered modules and errors.
    fn name(&self) -> &str;

    /// Lists candidate modules. An error here skips the whole source.
    fn candidates(&self) -> RegistryResult<Vec<Candidate>>;
}

type Constructor = Arc<dyn Fn() -> Result<Box<dyn FeatureModule>, String> + Send + Sync>;

/// Modules compiled into the host, each registered with an explicit
/// constructor.
#[derive(Clone)]
pub struct StaticSource {
    name: String,
    constructors: Vec<(String, Constructor)>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    /// Adds a constructor. Candidates are offered in insertion order.
    #[must_use]
    pub fn with<F>(mut self, label: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn FeatureModule>, String> + Send + Sync + 'static,
    {
        self.constructors.push((label.into(), Arc::new(constructor)));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl ModuleSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self) -> RegistryResult<Vec<Candidate>> {
        Ok(self
            .constructors
            .iter()
            .map(|(label, ctor)| {
                let ctor = Arc::clone(ctor);
                let candidate = label.clone();
                Candidate::new(label.clone(), move || {
                    ctor().map_err(|message| RegistryError::instantiation(candidate, message))
                })
            })
            .collect())
    }
}

/// A directory of `*.toml` module manifests.
///
/// Each manifest names its factory via `kind`; without one, the file stem is
/// the factory name (`quiz.toml` → `quiz`). Files are offered in file-name
/// order.
#[derive(Debug, Clone)]
pub struct ManifestDirSource {
    name: String,
    dir: PathBuf,
    factories: ModuleFactories,
}

impl ManifestDirSource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, factories: ModuleFactories) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            factories,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ModuleSource for ManifestDirSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self) -> RegistryResult<Vec<Candidate>> {
        if !self.dir.is_dir() {
            debug!(source = %self.name, "Manifest directory {:?} not present, skipping", self.dir);
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .map(|path| {
                let label = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let factories = self.factories.clone();
                Candidate::new(label, move || instantiate_manifest(&path, &factories))
            })
            .collect())
    }
}

fn instantiate_manifest(
    path: &Path,
    factories: &ModuleFactories,
) -> RegistryResult<Box<dyn FeatureModule>> {
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::InvalidManifest {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let manifest = ModuleManifest::parse(&contents).map_err(|e| RegistryError::InvalidManifest {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let kind = match &manifest.kind {
        Some(kind) => kind.clone(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let factory = factories.get(&kind).ok_or_else(|| {
        RegistryError::instantiation(&display, format!("no factory registered for kind '{kind}'"))
    })?;

    factory(&manifest).map_err(|message| RegistryError::instantiation(display, message))
}
