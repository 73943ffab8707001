//! Integration of generated plugins into the live registry.
//!
//! `Integrator::integrate` performs, under the registry lock:
//!
//! 1. load the client or worker definition (per execution context) as a task
//!    type; a definition that does not load leaves the registry untouched
//! 2. register it, either replacing the identifier's entry (warning on
//!    collision) or adding a version to its switcher
//! 3. publish the help page to `<help_root>/<identifier>_help.html`
//!
//! and then, if requested, upserts the external tool records.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::descriptor::{classify, Schema};
use crate::error::{ForgeError, Result};
use crate::generator::{generate, ArtifactKind, GeneratedPlugin, GenerationMode};

use super::loader::{discover_descriptors, load_definition};
use super::registry::PluginRegistry;
use super::store::{ToolFields, ToolStore};
use super::types::{
    version_type_name, AssetProvider, DefinitionContext, ExecutionContext, LoadedPlugin,
};

/// Mode bits applied to published help files: world-readable, group-writable.
pub const HELP_FILE_MODE: u32 = 0o664;

/// Options for one `integrate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrateOptions {
    /// Upsert the external tool record.
    pub register: bool,
    /// In a worker context, also upsert the tool-version record for this host.
    pub create_version_record: bool,
    /// Add the plugin as one version under a switcher instead of replacing
    /// the identifier's entry.
    pub multi_version: bool,
}

impl Default for IntegrateOptions {
    fn default() -> Self {
        Self {
            register: true,
            create_version_record: false,
            multi_version: false,
        }
    }
}

/// Options for `Integrator::bootstrap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootstrapOptions {
    pub mode: GenerationMode,
    /// Integrate every identifier through a switcher, even with one version.
    pub force_multi_version: bool,
    pub create_version_records: bool,
}

/// A descriptor integrated during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegratedTool {
    pub identifier: String,
    pub version: String,
    pub type_name: String,
    pub path: PathBuf,
}

/// A descriptor skipped during bootstrap, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDescriptor {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of `Integrator::bootstrap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub integrated: Vec<IntegratedTool>,
    pub skipped: Vec<SkippedDescriptor>,
}

/// Loads generated plugins into a registry and mirrors them to the external
/// tool store.
pub struct Integrator {
    registry: Arc<PluginRegistry>,
    store: Arc<dyn ToolStore>,
    context: ExecutionContext,
    help_root: PathBuf,
}

impl Integrator {
    pub fn new(
        registry: Arc<PluginRegistry>,
        store: Arc<dyn ToolStore>,
        context: ExecutionContext,
        help_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            store,
            context,
            help_root: help_root.into(),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn help_root(&self) -> &Path {
        &self.help_root
    }

    /// Path the help page of `identifier` is published to. Shared by all
    /// versions of the identifier; the last integration overwrites it.
    pub fn help_path(&self, identifier: &str) -> PathBuf {
        self.help_root.join(format!("{}_help.html", identifier))
    }

    /// Load `plugin` into the registry.
    ///
    /// Returns the loaded type. With `multi_version` the type is also added to
    /// the identifier's switcher, which is reachable through the registry.
    ///
    /// # Errors
    /// - `ForgeError::Load` if the definition for this context does not load;
    ///   the registry is unchanged
    /// - `ForgeError::HelpPublish` if the help page cannot be written; the
    ///   type stays registered
    /// - `ForgeError::Store` (or whatever the store returns) from external
    ///   registration; the type stays registered
    pub fn integrate(
        &self,
        plugin: Arc<GeneratedPlugin>,
        options: IntegrateOptions,
    ) -> Result<Arc<LoadedPlugin>> {
        let identifier = plugin.identifier.clone();
        let context = self.context.definition_context();
        let kind = match context {
            DefinitionContext::Client => ArtifactKind::ClientDefinition,
            DefinitionContext::Worker => ArtifactKind::WorkerDefinition,
        };

        let loaded = {
            let mut namespaces = self.registry.lock();

            let source = plugin.artifacts.get(kind).ok_or_else(|| {
                ForgeError::Load(format!("{}: no {} artifact", identifier, kind))
            })?;
            let definition = load_definition(source, &identifier, context)?;

            let type_name = if options.multi_version {
                version_type_name(&identifier, &definition.version)
            } else {
                identifier.clone()
            };
            let help_path = self.help_path(&identifier);
            let loaded = Arc::new(LoadedPlugin::new(
                definition,
                type_name,
                Arc::clone(&plugin),
                help_path.clone(),
            ));

            if options.multi_version {
                namespaces.insert_version(Arc::clone(&loaded));
            } else {
                namespaces.insert_generic(Arc::clone(&loaded));
            }

            let help = plugin
                .artifacts
                .get(ArtifactKind::HelpTemplate)
                .unwrap_or_default();
            publish_help(&help_path, help)?;
            loaded
        };

        if options.register {
            self.register_external(&loaded, options.create_version_record)?;
        }

        Ok(loaded)
    }

    /// Create-unless-exists the external records for a loaded type.
    fn register_external(&self, loaded: &LoadedPlugin, create_version_record: bool) -> Result<()> {
        let fields = ToolFields::from_descriptor(&loaded.generated().descriptor);
        let tool = self
            .store
            .upsert_tool(&loaded.qualified_name(), &fields)?
            .into_inner();

        if let (true, ExecutionContext::Worker { host }) = (create_version_record, &self.context) {
            self.store
                .upsert_tool_version(&tool, host, loaded.version(), &fields)?;
        }
        Ok(())
    }

    /// Generate and integrate every permitted descriptor under `dirs`.
    ///
    /// Identifiers seen with more than one distinct tool version are
    /// integrated through a version switcher. Descriptors that fail to
    /// generate or integrate are reported as skipped; the rest still load.
    pub fn bootstrap<F>(
        &self,
        schema: Arc<Schema>,
        dirs: &[PathBuf],
        options: BootstrapOptions,
        permitted: F,
    ) -> Result<BootstrapReport>
    where
        F: Fn(&str) -> bool,
    {
        let mut report = BootstrapReport::default();
        let mut candidates = Vec::new();

        for found in discover_descriptors(dirs)? {
            let name = found.descriptor.name().unwrap_or_default().to_string();
            if !permitted(&name) {
                info!(tool = %name, path = %found.path.display(), "Tool not permitted, skipping");
                report.skipped.push(SkippedDescriptor {
                    path: found.path,
                    reason: format!("tool '{}' is not permitted", name),
                });
                continue;
            }
            candidates.push(found);
        }

        let mut versions: HashMap<String, HashSet<String>> = HashMap::new();
        for found in &candidates {
            versions
                .entry(classify(found.descriptor.name().unwrap_or_default()))
                .or_default()
                .insert(found.descriptor.tool_version().unwrap_or_default().to_string());
        }

        for found in candidates {
            let identifier = classify(found.descriptor.name().unwrap_or_default());
            let multi_version = options.force_multi_version
                || versions.get(&identifier).map_or(0, HashSet::len) > 1;
            let integrate_options = IntegrateOptions {
                register: true,
                create_version_record: options.create_version_records,
                multi_version,
            };

            let outcome = generate(Arc::clone(&schema), found.descriptor, options.mode)
                .and_then(|plugin| self.integrate(Arc::new(plugin), integrate_options));
            match outcome {
                Ok(loaded) => report.integrated.push(IntegratedTool {
                    identifier: loaded.identifier().to_string(),
                    version: loaded.version().to_string(),
                    type_name: loaded.type_name().to_string(),
                    path: found.path,
                }),
                Err(e) => {
                    warn!(path = %found.path.display(), error = %e, "Failed to integrate descriptor, skipping");
                    report.skipped.push(SkippedDescriptor {
                        path: found.path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            integrated = report.integrated.len(),
            skipped = report.skipped.len(),
            "Bootstrap complete"
        );
        Ok(report)
    }
}

/// Write the help page and open up its permissions.
fn publish_help(path: &Path, body: &str) -> Result<()> {
    let wrap = |source: std::io::Error| ForgeError::HelpPublish {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    fs::write(path, body).map_err(wrap)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(HELP_FILE_MODE)).map_err(wrap)?;
    }

    debug!(path = %path.display(), "Published help page");
    Ok(())
}
