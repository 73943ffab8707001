//! Version switching for multi-version tools.
//!
//! A `VersionSwitcher` is the registry entry for an identifier that has more
//! than one tool version loaded. It is shared by every instance created under
//! that identifier and is only mutated by the integrator when a version is
//! added.
//!
//! Each instance (`SwitchedTask`) starts unbound. Supplying its `ToolConfig`
//! binds it to one loaded version, after which every `AssetProvider` call is
//! forwarded to that version. Binding happens at most once per instance.

use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{ForgeError, Result};
use crate::generator::ViewKind;

use super::types::{AssetProvider, LoadedPlugin, TaskDefinition, ToolConfig};

/// Placeholder body served for every view of an unbound instance.
pub const NO_VERSION_PLACEHOLDER: &str =
    "<p class=\"task-unbound\">No version specified</p>\n";

/// Dispatch point for all loaded versions of one identifier.
#[derive(Debug)]
pub struct VersionSwitcher {
    identifier: String,
    /// Insertion-ordered; the first entry is the fallback version.
    known_versions: RwLock<IndexMap<String, Arc<LoadedPlugin>>>,
}

impl VersionSwitcher {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            known_versions: RwLock::new(IndexMap::new()),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Add (or replace) the implementation of one version. A replaced version
    /// keeps its original position, so the fallback does not move.
    ///
    /// Returns the implementation that was replaced, if any.
    pub(crate) fn add_version(&self, plugin: Arc<LoadedPlugin>) -> Option<Arc<LoadedPlugin>> {
        let version = plugin.version().to_string();
        let replaced = self.known_versions.write().insert(version.clone(), plugin);
        if replaced.is_some() {
            warn!(
                identifier = %self.identifier,
                version = %version,
                "Version already registered, replacing implementation"
            );
        }
        replaced
    }

    /// Known version strings, in insertion order.
    pub fn versions(&self) -> Vec<String> {
        self.known_versions.read().keys().cloned().collect()
    }

    /// Implementation registered for exactly `version`.
    pub fn get(&self, version: &str) -> Option<Arc<LoadedPlugin>> {
        self.known_versions.read().get(version).cloned()
    }

    pub fn len(&self) -> usize {
        self.known_versions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_versions.read().is_empty()
    }

    /// Select the implementation for `version`.
    ///
    /// An unknown or missing version falls back to the first version that
    /// was added, with a warning.
    ///
    /// # Errors
    /// `ForgeError::NoKnownVersions` if no version was ever added.
    pub fn resolve(&self, version: Option<&str>) -> Result<Arc<LoadedPlugin>> {
        let known = self.known_versions.read();
        if let Some(plugin) = version.and_then(|v| known.get(v)) {
            return Ok(Arc::clone(plugin));
        }

        let (fallback_version, fallback) = known
            .first()
            .ok_or_else(|| ForgeError::NoKnownVersions(self.identifier.clone()))?;
        warn!(
            identifier = %self.identifier,
            requested = version.unwrap_or("<unconfigured>"),
            fallback = %fallback_version,
            "Requested version is not registered, falling back to first registered version"
        );
        Ok(Arc::clone(fallback))
    }

    /// Create a new, unbound instance dispatching through this switcher.
    pub fn instantiate(self: &Arc<Self>) -> SwitchedTask {
        SwitchedTask {
            switcher: Arc::clone(self),
            tool_config: None,
            bound: None,
        }
    }
}

/// One task instance created under a multi-version identifier.
#[derive(Debug, Clone)]
pub struct SwitchedTask {
    switcher: Arc<VersionSwitcher>,
    tool_config: Option<ToolConfig>,
    bound: Option<Arc<LoadedPlugin>>,
}

impl SwitchedTask {
    pub fn identifier(&self) -> &str {
        self.switcher.identifier()
    }

    pub fn switcher(&self) -> &Arc<VersionSwitcher> {
        &self.switcher
    }

    pub fn tool_config(&self) -> Option<&ToolConfig> {
        self.tool_config.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// The implementation this instance is bound to.
    pub fn bound_plugin(&self) -> Option<&Arc<LoadedPlugin>> {
        self.bound.as_ref()
    }

    /// Attach the version-selecting configuration and bind the instance.
    ///
    /// # Errors
    /// - `ForgeError::AlreadyBound` if the instance was bound before; the
    ///   existing binding and configuration are kept
    /// - `ForgeError::NoKnownVersions` if the switcher is empty; the instance
    ///   stays unbound
    pub fn set_tool_config(&mut self, config: ToolConfig) -> Result<&Arc<LoadedPlugin>> {
        if self.bound.is_some() {
            return Err(ForgeError::AlreadyBound(self.identifier().to_string()));
        }

        let plugin = self.switcher.resolve(Some(&config.version))?;
        debug!(
            identifier = %self.identifier(),
            requested = %config.version,
            bound = %plugin.type_name(),
            "Bound task instance"
        );
        self.tool_config = Some(config);
        let bound = self.bound.insert(plugin);
        Ok(&*bound)
    }
}

impl AssetProvider for SwitchedTask {
    fn type_name(&self) -> &str {
        match &self.bound {
            Some(plugin) => plugin.type_name(),
            None => self.identifier(),
        }
    }

    fn public_path(&self) -> Option<&Path> {
        self.bound.as_ref().and_then(|plugin| plugin.public_path())
    }

    fn raw_partial(&self, view: ViewKind) -> &str {
        match &self.bound {
            Some(plugin) => plugin.raw_partial(view),
            None => NO_VERSION_PLACEHOLDER,
        }
    }

    fn help_path(&self) -> Option<&Path> {
        self.bound.as_ref().and_then(|plugin| plugin.help_path())
    }

    fn definition(&self) -> Option<&TaskDefinition> {
        self.bound.as_ref().and_then(|plugin| plugin.definition())
    }

    fn is_a(&self, type_name: &str) -> bool {
        match &self.bound {
            Some(plugin) => plugin.is_a(type_name),
            None => type_name == self.identifier(),
        }
    }
}

/// An instance created from a registry entry.
#[derive(Debug, Clone)]
pub enum TaskInstance {
    /// Instance of a single-version type.
    Plain(Arc<LoadedPlugin>),
    /// Instance dispatching through a version switcher.
    Switched(SwitchedTask),
}

impl TaskInstance {
    fn provider(&self) -> &dyn AssetProvider {
        match self {
            TaskInstance::Plain(plugin) => &**plugin,
            TaskInstance::Switched(task) => task,
        }
    }

    /// The switched instance, for binding a version.
    pub fn as_switched_mut(&mut self) -> Option<&mut SwitchedTask> {
        match self {
            TaskInstance::Plain(_) => None,
            TaskInstance::Switched(task) => Some(task),
        }
    }
}

impl AssetProvider for TaskInstance {
    fn type_name(&self) -> &str {
        self.provider().type_name()
    }

    fn public_path(&self) -> Option<&Path> {
        self.provider().public_path()
    }

    fn raw_partial(&self, view: ViewKind) -> &str {
        self.provider().raw_partial(view)
    }

    fn help_path(&self) -> Option<&Path> {
        self.provider().help_path()
    }

    fn definition(&self) -> Option<&TaskDefinition> {
        self.provider().definition()
    }

    fn is_a(&self, type_name: &str) -> bool {
        self.provider().is_a(type_name)
    }
}
