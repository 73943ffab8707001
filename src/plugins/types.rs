//! Plugin types for Taskforge
//!
//! This module defines the runtime side of a generated plugin: the task
//! definition parsed from generated source, the execution context that
//! selects which definition is loaded, the loaded plugin type itself, and the
//! `AssetProvider` capability shared by loaded plugins and version-switched
//! instances.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::generator::{GeneratedPlugin, ViewKind};

/// Prefix of the fully-qualified name every loaded task type is published under.
pub const QUALIFIED_PREFIX: &str = "Task::";

/// Which side of a task a definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionContext {
    /// The submitting side: parameters and outputs, no command.
    Client,
    /// The executing side: additionally carries the command line.
    Worker,
}

impl DefinitionContext {
    pub fn name(self) -> &'static str {
        match self {
            DefinitionContext::Client => "client",
            DefinitionContext::Worker => "worker",
        }
    }
}

impl fmt::Display for DefinitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DefinitionContext {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(DefinitionContext::Client),
            "worker" => Ok(DefinitionContext::Worker),
            other => Err(ForgeError::Config(format!(
                "Unknown execution context '{}': expected 'client' or 'worker'",
                other
            ))),
        }
    }
}

/// The context the integrator runs in.
///
/// Only a worker context has a host; tool-version records are created for
/// that host and never from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Client,
    Worker { host: String },
}

impl ExecutionContext {
    /// Which generated definition is loaded in this context.
    pub fn definition_context(&self) -> DefinitionContext {
        match self {
            ExecutionContext::Client => DefinitionContext::Client,
            ExecutionContext::Worker { .. } => DefinitionContext::Worker,
        }
    }

    /// Worker host name, if any.
    pub fn host(&self) -> Option<&str> {
        match self {
            ExecutionContext::Client => None,
            ExecutionContext::Worker { host } => Some(host),
        }
    }
}

/// One declared task parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub id: String,
    /// Parameter type as declared by the descriptor (`String`, `File`, ...).
    pub kind: String,
    pub optional: bool,
    /// Placeholder substituted into the command line, if any.
    pub value_key: Option<String>,
}

/// One declared output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub id: String,
    pub path_template: String,
    pub optional: bool,
}

/// A task type loaded from a generated client or worker definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Canonical identifier the definition declares.
    pub identifier: String,
    /// Side the definition was generated for.
    pub context: DefinitionContext,
    /// Original tool name.
    pub tool: String,
    pub version: String,
    pub description: Option<String>,
    pub image: Option<String>,
    /// Command line; always present on worker definitions.
    pub command: Option<String>,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl TaskDefinition {
    /// Look up a declared input by id.
    pub fn input(&self, id: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|input| input.id == id)
    }

    /// Ids of the inputs that must be supplied.
    pub fn required_inputs(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter(|input| !input.optional)
            .map(|input| input.id.as_str())
            .collect()
    }
}

/// Version-selecting configuration attached to a task instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// The tool version this instance should run.
    pub version: String,
}

impl ToolConfig {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// UI and help capabilities every task type exposes, whether it is a plain
/// loaded plugin or an instance dispatching through a version switcher.
pub trait AssetProvider {
    /// Type name the object reports (version-qualified when switched).
    fn type_name(&self) -> &str;

    /// Public asset directory. Generated plugins ship none.
    fn public_path(&self) -> Option<&Path>;

    /// Raw body of one UI template.
    fn raw_partial(&self, view: ViewKind) -> &str;

    /// Published help file, if the type is bound to a version.
    ///
    /// The path is per identifier, not per version: every version of a
    /// multi-version tool points at the same file, which holds the help page
    /// of whichever version was integrated last.
    fn help_path(&self) -> Option<&Path>;

    /// The loaded task definition, if the type is bound to a version.
    fn definition(&self) -> Option<&TaskDefinition>;

    /// Type predicate: true for the reported type name or its identifier.
    fn is_a(&self, type_name: &str) -> bool;
}

/// Type name of one version of a multi-version identifier, e.g.
/// `FslBetV6_2e0_2e4` for `FslBet` at `6.0.4`.
///
/// ASCII alphanumerics are kept; every other byte is written as `_` plus two
/// lowercase hex digits, so distinct versions never share a type name.
pub fn version_type_name(identifier: &str, version: &str) -> String {
    let mut name = format!("{}V", identifier);
    for byte in version.bytes() {
        if byte.is_ascii_alphanumeric() {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("_{:02x}", byte));
        }
    }
    name
}

/// A generated plugin loaded as an addressable task type.
///
/// Holds the parsed definition for the active execution context and a
/// back-reference to the `GeneratedPlugin` it came from.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    definition: TaskDefinition,
    type_name: String,
    generated: Arc<GeneratedPlugin>,
    help_path: PathBuf,
}

impl LoadedPlugin {
    pub(crate) fn new(
        definition: TaskDefinition,
        type_name: String,
        generated: Arc<GeneratedPlugin>,
        help_path: PathBuf,
    ) -> Self {
        Self {
            definition,
            type_name,
            generated,
            help_path,
        }
    }

    /// Canonical identifier.
    pub fn identifier(&self) -> &str {
        &self.definition.identifier
    }

    /// Tool version of the loaded definition.
    pub fn version(&self) -> &str {
        &self.definition.version
    }

    /// Fully-qualified name, e.g. `Task::FslBet`; keys the external tool record.
    pub fn qualified_name(&self) -> String {
        format!("{}{}", QUALIFIED_PREFIX, self.identifier())
    }

    /// The plugin this type was loaded from.
    pub fn generated(&self) -> &Arc<GeneratedPlugin> {
        &self.generated
    }
}

impl AssetProvider for LoadedPlugin {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn public_path(&self) -> Option<&Path> {
        None
    }

    fn raw_partial(&self, view: ViewKind) -> &str {
        self.generated
            .artifacts
            .get(view.artifact())
            .unwrap_or_default()
    }

    fn help_path(&self) -> Option<&Path> {
        Some(&self.help_path)
    }

    fn definition(&self) -> Option<&TaskDefinition> {
        Some(&self.definition)
    }

    fn is_a(&self, type_name: &str) -> bool {
        type_name == self.type_name
            || type_name == self.identifier()
            || type_name == self.qualified_name()
    }
}
