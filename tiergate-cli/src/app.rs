//! Wiring of store, policy, registry and engine for one CLI invocation.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use tiergate_entitlement::EntitlementEngine;
use tiergate_policy::{default_policy_path, TierPolicyTable};
use tiergate_registry::{
    DiscoveryReport, ManifestDirSource, ModuleFactories, ModuleRegistry, ModuleSource,
};
use tiergate_store::SqliteStore;
use tiergate_types::{AuditSink, BroadcastEventBus, EventBus};
use tracing::{info, warn};

/// A fully wired Tiergate instance.
pub struct App {
    pub store: SqliteStore,
    pub policy: Arc<TierPolicyTable>,
    pub registry: Arc<ModuleRegistry>,
    pub engine: EntitlementEngine,
    pub bus: Arc<BroadcastEventBus>,
    /// Result of the startup module discovery.
    pub discovery: DiscoveryReport,
}

impl App {
    /// Opens the database, loads the policy and discovers modules.
    pub fn open(config: &CliConfig) -> Result<Self> {
        Self::open_with(config, ModuleFactories::new())
    }

    /// Like [`open`](Self::open) with host-provided module factories.
    pub fn open_with(config: &CliConfig, factories: ModuleFactories) -> Result<Self> {
        if let Some(parent) = config.database.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {parent:?}"))?;
        }
        let store = SqliteStore::open(&config.database)
            .with_context(|| format!("Failed to open database {:?}", config.database))?;

        let policy_path = config.policy.clone().unwrap_or_else(default_policy_path);
        let policy = Arc::new(TierPolicyTable::load_from(policy_path));

        let bus = Arc::new(BroadcastEventBus::default());
        let registry = Arc::new(ModuleRegistry::new(bus.clone() as Arc<dyn EventBus>));

        let sources: Vec<Box<dyn ModuleSource>> = config
            .module_dirs
            .iter()
            .map(|dir| {
                Box::new(ManifestDirSource::new(&dir.name, &dir.path, factories.clone()))
                    as Box<dyn ModuleSource>
            })
            .collect();
        let discovery = registry.discover(sources);
        for error in &discovery.errors {
            warn!("Module discovery: {}", error);
        }
        info!(modules = registry.len(), "Tiergate ready");

        let shared = Arc::new(store.clone());
        let engine = EntitlementEngine::builder(
            shared.clone(),
            shared.clone(),
            Arc::clone(&policy),
            Arc::clone(&registry),
        )
        .audit(shared as Arc<dyn AuditSink>)
        .events(bus.clone())
        .build();

        Ok(Self {
            store,
            policy,
            registry,
            engine,
            bus,
            discovery,
        })
    }
}
