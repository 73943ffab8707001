//! Plugin registry for Taskforge
//!
//! This module provides the `PluginRegistry`, the process-wide table of
//! loaded task types keyed by canonical identifier. It keeps two namespaces:
//!
//! - **generic**: identifier to a single loaded plugin
//! - **versioned**: identifier to a `VersionSwitcher` holding several versions
//!
//! An identifier lives in at most one namespace. Both namespaces sit behind a
//! single mutex; the integrator holds that lock across a whole integration
//! (load, register, publish help) so concurrent integrations of the same
//! identifier serialize.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::switcher::{TaskInstance, VersionSwitcher};
use super::types::LoadedPlugin;

/// The value registered under one identifier.
#[derive(Debug, Clone)]
pub enum RegistryEntry {
    /// A single loaded type.
    Generic(Arc<LoadedPlugin>),
    /// Several versions dispatched through a switcher.
    Versioned(Arc<VersionSwitcher>),
}

impl RegistryEntry {
    pub fn identifier(&self) -> &str {
        match self {
            RegistryEntry::Generic(plugin) => plugin.identifier(),
            RegistryEntry::Versioned(switcher) => switcher.identifier(),
        }
    }

    /// Create a new instance of the registered type.
    pub fn instantiate(&self) -> TaskInstance {
        match self {
            RegistryEntry::Generic(plugin) => TaskInstance::Plain(Arc::clone(plugin)),
            RegistryEntry::Versioned(switcher) => TaskInstance::Switched(switcher.instantiate()),
        }
    }

    /// Whether this entry is the version switcher `switcher`.
    pub fn is_switcher(&self, switcher: &Arc<VersionSwitcher>) -> bool {
        matches!(self, RegistryEntry::Versioned(current) if Arc::ptr_eq(current, switcher))
    }
}

/// Registry state guarded by the registry lock.
#[derive(Debug, Default)]
pub struct Namespaces {
    generic: HashMap<String, Arc<LoadedPlugin>>,
    versioned: HashMap<String, Arc<VersionSwitcher>>,
}

impl Namespaces {
    /// Entry currently reachable under `identifier`.
    pub fn lookup(&self, identifier: &str) -> Option<RegistryEntry> {
        if let Some(switcher) = self.versioned.get(identifier) {
            return Some(RegistryEntry::Versioned(Arc::clone(switcher)));
        }
        self.generic
            .get(identifier)
            .map(|plugin| RegistryEntry::Generic(Arc::clone(plugin)))
    }

    /// Register a single-version type. Any entry already registered under the
    /// identifier, in either namespace, is replaced with a warning.
    ///
    /// Returns the displaced entry, if any.
    pub(crate) fn insert_generic(&mut self, plugin: Arc<LoadedPlugin>) -> Option<RegistryEntry> {
        let identifier = plugin.identifier().to_string();
        let displaced = self
            .versioned
            .remove(&identifier)
            .map(RegistryEntry::Versioned)
            .or_else(|| self.generic.remove(&identifier).map(RegistryEntry::Generic));

        if let Some(old) = &displaced {
            let namespace = match old {
                RegistryEntry::Generic(_) => "generic",
                RegistryEntry::Versioned(_) => "versioned",
            };
            warn!(
                identifier = %identifier,
                namespace,
                "Identifier already registered, replacing existing type"
            );
        }

        info!(identifier = %identifier, version = %plugin.version(), "Registered task type");
        self.generic.insert(identifier, plugin);
        displaced
    }

    /// Add one version under the identifier's switcher, creating the switcher
    /// (and evicting a generic entry, with a warning) if needed.
    pub(crate) fn insert_version(&mut self, plugin: Arc<LoadedPlugin>) -> Arc<VersionSwitcher> {
        let identifier = plugin.identifier().to_string();

        if self.generic.remove(&identifier).is_some() {
            warn!(
                identifier = %identifier,
                "Single-version type registered under identifier, replacing with version switcher"
            );
        }

        let switcher = Arc::clone(
            self.versioned
                .entry(identifier.clone())
                .or_insert_with(|| Arc::new(VersionSwitcher::new(identifier.clone()))),
        );
        let version = plugin.version().to_string();
        switcher.add_version(plugin);
        info!(
            identifier = %identifier,
            version = %version,
            versions = switcher.len(),
            "Registered task version"
        );
        switcher
    }

    pub fn len(&self) -> usize {
        self.generic.len() + self.versioned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generic.is_empty() && self.versioned.is_empty()
    }
}

/// Process-wide table of loaded task types.
///
/// # Example
///
/// ```rust
/// use taskforge::plugins::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// assert!(registry.is_empty());
/// assert!(registry.lookup("FslBet").is_none());
/// ```
#[derive(Debug, Default)]
pub struct PluginRegistry {
    namespaces: Mutex<Namespaces>,
}

impl PluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the registry lock for a multi-step mutation.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Namespaces> {
        self.namespaces.lock()
    }

    /// Register a single-version type, replacing any previous entry.
    pub fn register(&self, plugin: Arc<LoadedPlugin>) -> Option<RegistryEntry> {
        self.lock().insert_generic(plugin)
    }

    /// Register one version of a multi-version type.
    pub fn register_version(&self, plugin: Arc<LoadedPlugin>) -> Arc<VersionSwitcher> {
        self.lock().insert_version(plugin)
    }

    /// Entry currently reachable under `identifier`.
    pub fn lookup(&self, identifier: &str) -> Option<RegistryEntry> {
        self.lock().lookup(identifier)
    }

    /// Create a new instance of the type registered under `identifier`.
    pub fn instantiate(&self, identifier: &str) -> Option<TaskInstance> {
        self.lookup(identifier).map(|entry| entry.instantiate())
    }

    /// All registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let namespaces = self.lock();
        let mut identifiers: Vec<String> = namespaces
            .generic
            .keys()
            .chain(namespaces.versioned.keys())
            .cloned()
            .collect();
        identifiers.sort();
        identifiers
    }

    /// Number of registered identifiers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every registration.
    pub fn clear(&self) {
        let mut namespaces = self.lock();
        namespaces.generic.clear();
        namespaces.versioned.clear();
    }
}
