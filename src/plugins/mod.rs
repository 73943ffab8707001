//! Plugin registry and integration for Taskforge
//!
//! This module takes a `GeneratedPlugin` the rest of the way: its client or
//! worker definition is loaded as an addressable task type, registered under
//! the canonical identifier, its help page is published, and the external
//! tool registry is told about it. Several versions of one tool can coexist
//! behind a `VersionSwitcher`.
//!
//! # Architecture
//!
//! - **types**: `TaskDefinition`, `LoadedPlugin`, `ExecutionContext`, and the
//!   `AssetProvider` capability
//! - **loader**: definition parsing and descriptor directory discovery
//! - **registry**: `PluginRegistry`, two namespaces behind one lock
//! - **switcher**: `VersionSwitcher` and one-shot per-instance binding
//! - **store**: the external `ToolStore` interface and an in-memory store
//! - **integrator**: `Integrator::integrate` and `Integrator::bootstrap`
//!
//! # Descriptor Directory Structure
//!
//! ```text
//! ~/.taskforge/descriptors/
//! ├── fsl_bet-6.0.4.json
//! ├── fsl_bet-6.0.5.json      # second version: integrated via a switcher
//! └── dcm2niix.json
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use taskforge::descriptor::Schema;
//! use taskforge::plugins::{
//!     BootstrapOptions, ExecutionContext, InMemoryToolStore, Integrator, PluginRegistry,
//! };
//!
//! let integrator = Integrator::new(
//!     Arc::new(PluginRegistry::new()),
//!     Arc::new(InMemoryToolStore::new()),
//!     ExecutionContext::Client,
//!     PathBuf::from("public/help"),
//! );
//! let dirs = vec![PathBuf::from("/home/user/.taskforge/descriptors")];
//! let report = integrator
//!     .bootstrap(Arc::new(Schema::builtin().unwrap()), &dirs, BootstrapOptions::default(), |_| true)
//!     .unwrap();
//!
//! println!("Loaded {} tools", report.integrated.len());
//! ```

pub mod integrator;
mod loader;
pub mod registry;
pub mod store;
pub mod switcher;
pub mod types;

pub use integrator::{
    BootstrapOptions, BootstrapReport, IntegrateOptions, IntegratedTool, Integrator,
    SkippedDescriptor, HELP_FILE_MODE,
};
pub use loader::{discover_descriptors, load_definition, validate_definition, DiscoveredDescriptor};
pub use registry::{PluginRegistry, RegistryEntry};
pub use store::{
    InMemoryToolStore, ToolFields, ToolRecord, ToolStore, ToolVersionRecord, Upserted,
    TOOL_CATEGORY,
};
pub use switcher::{SwitchedTask, TaskInstance, VersionSwitcher, NO_VERSION_PLACEHOLDER};
pub use types::{
    version_type_name, AssetProvider, DefinitionContext, ExecutionContext, InputSpec,
    LoadedPlugin, OutputSpec, TaskDefinition, ToolConfig,
};
