//! Configuration for Taskforge
//!
//! Settings are read from `~/.taskforge/config.json` (every field optional)
//! and then overridden by environment variables:
//!
//! | Variable                    | Field             |
//! |-----------------------------|-------------------|
//! | `TASKFORGE_HELP_ROOT`       | `help_root`       |
//! | `TASKFORGE_EXPORT_ROOT`     | `export_root`     |
//! | `TASKFORGE_DESCRIPTOR_DIRS` | `descriptor_dirs` (`:`-separated) |
//! | `TASKFORGE_CONTEXT`         | `context`         |
//! | `TASKFORGE_HOST`            | `host`            |
//! | `TASKFORGE_STRICT`          | `strict`          |
//!
//! Path fields accept a leading `~`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ForgeError, Result};
use crate::generator::GenerationMode;
use crate::plugins::{DefinitionContext, ExecutionContext};

pub const ENV_HELP_ROOT: &str = "TASKFORGE_HELP_ROOT";
pub const ENV_EXPORT_ROOT: &str = "TASKFORGE_EXPORT_ROOT";
pub const ENV_DESCRIPTOR_DIRS: &str = "TASKFORGE_DESCRIPTOR_DIRS";
pub const ENV_CONTEXT: &str = "TASKFORGE_CONTEXT";
pub const ENV_HOST: &str = "TASKFORGE_HOST";
pub const ENV_STRICT: &str = "TASKFORGE_STRICT";

/// Taskforge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Directory help pages are published to.
    pub help_root: String,
    /// Default base directory for `generate` exports.
    pub export_root: String,
    /// Directories scanned for descriptors by `bootstrap`.
    pub descriptor_dirs: Vec<String>,
    /// Which definition to load when integrating.
    pub context: DefinitionContext,
    /// Execution host; required in the worker context.
    pub host: Option<String>,
    /// Abort generation on validation errors.
    pub strict: bool,
    /// Create tool-version records when integrating in the worker context.
    pub create_version_records: bool,
    /// Allowlist of tool names. Empty allows every tool.
    pub allowed_tools: Vec<String>,
    /// Blocklist of tool names. Takes precedence over the allowlist.
    pub blocked_tools: Vec<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            help_root: "~/.taskforge/public/help".to_string(),
            export_root: "./plugins".to_string(),
            descriptor_dirs: vec!["~/.taskforge/descriptors".to_string()],
            context: DefinitionContext::Client,
            host: None,
            strict: true,
            create_version_records: false,
            allowed_tools: Vec::new(),
            blocked_tools: Vec::new(),
        }
    }
}

impl ForgeConfig {
    /// Base directory, `~/.taskforge`.
    pub fn dir() -> PathBuf {
        dirs::home_dir().unwrap_or_default().join(".taskforge")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path and the process environment.
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(&Self::path(), &env)
    }

    /// Load from `path` (defaults when it does not exist), then apply
    /// overrides from `env`.
    pub fn load_from(path: &Path, env: &HashMap<String, String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ForgeError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&content).map_err(|e| {
                ForgeError::Config(format!("Invalid config {}: {}", path.display(), e))
            })?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env(env)?;
        Ok(config)
    }

    /// Apply `TASKFORGE_*` overrides. Empty values are ignored.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(value) = get(ENV_HELP_ROOT) {
            self.help_root = value.to_string();
        }
        if let Some(value) = get(ENV_EXPORT_ROOT) {
            self.export_root = value.to_string();
        }
        if let Some(value) = get(ENV_DESCRIPTOR_DIRS) {
            self.descriptor_dirs = value
                .split(':')
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = get(ENV_CONTEXT) {
            self.context = value.parse()?;
        }
        if let Some(value) = get(ENV_HOST) {
            self.host = Some(value.to_string());
        }
        if let Some(value) = get(ENV_STRICT) {
            self.strict = parse_bool(ENV_STRICT, value)?;
        }
        Ok(())
    }

    /// Resolve `context` and `host` into an execution context.
    ///
    /// # Errors
    /// `ForgeError::Config` for a worker context without a host.
    pub fn execution_context(&self) -> Result<ExecutionContext> {
        match self.context {
            DefinitionContext::Client => Ok(ExecutionContext::Client),
            DefinitionContext::Worker => {
                let host = self
                    .host
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        ForgeError::Config("worker context requires a host".to_string())
                    })?;
                Ok(ExecutionContext::Worker {
                    host: host.to_string(),
                })
            }
        }
    }

    /// Generation mode implied by `strict`.
    pub fn generation_mode(&self) -> GenerationMode {
        if self.strict {
            GenerationMode::Strict
        } else {
            GenerationMode::Permissive
        }
    }

    /// Check whether a tool name is permitted by the allow/block lists.
    ///
    /// A tool is permitted if:
    /// - It is not in the blocked list, AND
    /// - The allowed list is empty (all tools allowed) OR the tool is in the allowed list.
    pub fn is_tool_permitted(&self, name: &str) -> bool {
        if self.blocked_tools.iter().any(|t| t == name) {
            return false;
        }
        if self.allowed_tools.is_empty() {
            return true;
        }
        self.allowed_tools.iter().any(|t| t == name)
    }

    pub fn help_root_path(&self) -> PathBuf {
        expand_tilde(&self.help_root)
    }

    pub fn export_root_path(&self) -> PathBuf {
        expand_tilde(&self.export_root)
    }

    pub fn descriptor_dir_paths(&self) -> Vec<PathBuf> {
        self.descriptor_dirs.iter().map(|d| expand_tilde(d)).collect()
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ForgeError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.context, DefinitionContext::Client);
        assert!(config.strict);
        assert!(!config.create_version_records);
        assert_eq!(config.generation_mode(), GenerationMode::Strict);
        assert_eq!(config.execution_context().unwrap(), ExecutionContext::Client);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = ForgeConfig::load_from(&tmp.path().join("config.json"), &env(&[])).unwrap();
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"context": "worker", "host": "hpc1", "strict": false}"#).unwrap();

        let config = ForgeConfig::load_from(&path, &env(&[])).unwrap();
        assert_eq!(config.context, DefinitionContext::Worker);
        assert!(!config.strict);
        assert_eq!(config.export_root, "./plugins");
        assert_eq!(
            config.execution_context().unwrap(),
            ExecutionContext::Worker {
                host: "hpc1".to_string()
            }
        );
    }

    #[test]
    fn test_load_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        let err = ForgeConfig::load_from(&path, &env(&[])).unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ForgeConfig::default();
        config
            .apply_env(&env(&[
                (ENV_HELP_ROOT, "/srv/help"),
                (ENV_DESCRIPTOR_DIRS, "/a: /b ::"),
                (ENV_CONTEXT, "worker"),
                (ENV_HOST, "hpc2"),
                (ENV_STRICT, "off"),
                (ENV_EXPORT_ROOT, ""),
            ]))
            .unwrap();

        assert_eq!(config.help_root_path(), PathBuf::from("/srv/help"));
        assert_eq!(config.descriptor_dirs, vec!["/a", "/b"]);
        assert_eq!(config.context, DefinitionContext::Worker);
        assert_eq!(config.host.as_deref(), Some("hpc2"));
        assert!(!config.strict);
        assert_eq!(config.export_root, "./plugins");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = ForgeConfig::default();
        assert!(config.apply_env(&env(&[(ENV_STRICT, "maybe")])).is_err());
        assert!(config.apply_env(&env(&[(ENV_CONTEXT, "server")])).is_err());
    }

    #[test]
    fn test_worker_context_requires_host() {
        let config = ForgeConfig {
            context: DefinitionContext::Worker,
            ..ForgeConfig::default()
        };
        let err = config.execution_context().unwrap_err();
        assert!(err.to_string().contains("requires a host"));
    }

    #[test]
    fn test_tool_permissions() {
        let mut config = ForgeConfig::default();
        assert!(config.is_tool_permitted("anything"));

        config.allowed_tools = vec!["fsl_bet".to_string(), "dcm2niix".to_string()];
        assert!(config.is_tool_permitted("fsl_bet"));
        assert!(!config.is_tool_permitted("other"));

        config.blocked_tools = vec!["fsl_bet".to_string()];
        assert!(!config.is_tool_permitted("fsl_bet"));
        assert!(config.is_tool_permitted("dcm2niix"));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("rel/path"), PathBuf::from("rel/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x"), home.join("x"));
            assert_eq!(expand_tilde("~"), home);
        }
    }
}
