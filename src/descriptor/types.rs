//! Descriptor types for Taskforge
//!
//! A descriptor is a JSON document describing one tool's invocation contract
//! (name, version, inputs, outputs, container image). This module defines the
//! descriptor wrapper, the validation error record, and the document sources
//! both descriptors and schemas can be loaded from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ForgeError, Result};

/// Where a JSON document (descriptor or schema) comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file on disk.
    Path(PathBuf),
    /// Raw document text.
    Text(String),
    /// An already-parsed document.
    Value(Value),
    /// A string that is either an existing file path or inline text.
    /// The path interpretation wins when the file exists.
    Auto(String),
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

impl From<Value> for DocumentSource {
    fn from(value: Value) -> Self {
        DocumentSource::Value(value)
    }
}

impl From<&str> for DocumentSource {
    fn from(s: &str) -> Self {
        DocumentSource::Auto(s.to_string())
    }
}

impl From<String> for DocumentSource {
    fn from(s: String) -> Self {
        DocumentSource::Auto(s)
    }
}

impl DocumentSource {
    /// Read and parse the document. The error message is returned as a plain
    /// string so callers can wrap it in the error variant for their kind of
    /// document.
    pub(crate) fn parse(self) -> std::result::Result<Value, String> {
        match self {
            DocumentSource::Value(value) => Ok(value),
            DocumentSource::Path(path) => read_json_file(&path),
            DocumentSource::Text(text) => {
                serde_json::from_str(&text).map_err(|e| format!("invalid JSON text: {}", e))
            }
            DocumentSource::Auto(s) => {
                let path = Path::new(&s);
                if path.is_file() {
                    return read_json_file(path);
                }
                serde_json::from_str(&s).map_err(|e| {
                    format!(
                        "'{}' is neither an existing file nor valid JSON text: {}",
                        abbreviate(&s),
                        e
                    )
                })
            }
        }
    }
}

fn read_json_file(path: &Path) -> std::result::Result<Value, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in {}: {}", path.display(), e))
}

fn abbreviate(s: &str) -> String {
    const MAX: usize = 60;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{}...", head)
    }
}

/// One structural problem found in a descriptor.
///
/// `path` is the sequence of keys (object keys and array indices) leading to
/// the offending value. For a missing required field the path ends with the
/// name of that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Keys leading to the offending value.
    pub path: Vec<String>,
    /// Human readable description of the problem.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error.
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// The path rendered as a JSON pointer (`/inputs/0/id`).
    pub fn pointer(&self) -> String {
        self.path
            .iter()
            .map(|segment| format!("/{}", segment))
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "/: {}", self.message)
        } else {
            write!(f, "{}: {}", self.pointer(), self.message)
        }
    }
}

/// A tool descriptor document.
///
/// The wrapper guarantees the document is a JSON object; everything else is
/// checked by `Schema::validate`. Accessors return `None` for absent or
/// mistyped fields so that permissive-mode generation can still inspect a
/// descriptor that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    document: Map<String, Value>,
}

impl Descriptor {
    /// Load a descriptor from any document source.
    ///
    /// # Errors
    /// `ForgeError::DescriptorLoad` if the source cannot be read or parsed,
    /// or if the document is not a JSON object.
    pub fn load(source: impl Into<DocumentSource>) -> Result<Self> {
        let value = source.into().parse().map_err(ForgeError::DescriptorLoad)?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed document.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(document) => Ok(Self { document }),
            other => Err(ForgeError::DescriptorLoad(format!(
                "descriptor must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The raw document.
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// The document as a `Value` (cloned).
    pub fn to_value(&self) -> Value {
        Value::Object(self.document.clone())
    }

    /// Top-level field lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Nested lookup by a dotted path (`container-image.image`, `inputs.0.id`).
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut segments = dotted.split('.');
        let first = segments.next()?;
        let mut current = self.document.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.document.get(key).and_then(Value::as_str)
    }

    /// Tool name.
    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    /// Tool version string.
    pub fn tool_version(&self) -> Option<&str> {
        self.str_field("tool-version")
    }

    /// Free-form description.
    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
    }

    /// Command line template with `[VALUE-KEY]` markers.
    pub fn command_line(&self) -> Option<&str> {
        self.str_field("command-line")
    }

    /// Container image: the flat `docker-image` field, falling back to
    /// `container-image.image`.
    pub fn docker_image(&self) -> Option<&str> {
        self.str_field("docker-image").or_else(|| {
            self.document
                .get("container-image")
                .and_then(|c| c.get("image"))
                .and_then(Value::as_str)
        })
    }

    /// Input definitions (empty if absent or mistyped).
    pub fn inputs(&self) -> &[Value] {
        self.array_field("inputs")
    }

    /// Output file definitions (empty if absent or mistyped).
    pub fn output_files(&self) -> &[Value] {
        self.array_field("output-files")
    }

    fn array_field(&self, key: &str) -> &[Value] {
        self.document
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
