//! External tool registry records.
//!
//! The persistent store for tool metadata lives outside this crate. The
//! integrator talks to it only through [`ToolStore`], whose two operations are
//! create-unless-exists: an existing record is returned untouched, never
//! updated.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::descriptor::Descriptor;
use crate::error::Result;

/// Category assigned to every tool record created from a descriptor.
pub const TOOL_CATEGORY: &str = "scientific tool";

/// Descriptor fields copied onto external records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFields {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub docker_image: Option<String>,
}

impl ToolFields {
    /// Extract `(name, version, description, docker-image)` from a descriptor.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        Self {
            name: descriptor.name().unwrap_or_default().to_string(),
            version: descriptor.tool_version().unwrap_or_default().to_string(),
            description: descriptor.description().map(str::to_string),
            docker_image: descriptor.docker_image().map(str::to_string),
        }
    }

    /// Label shown in the launch menu.
    pub fn select_menu_text(&self) -> String {
        format!("Launch {}", self.name)
    }
}

/// Outcome of a create-unless-exists call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted<T> {
    /// No record existed under the key; this one was created.
    Created(T),
    /// A record already existed and is returned unchanged.
    Existing(T),
}

impl<T> Upserted<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Upserted::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Upserted::Created(record) | Upserted::Existing(record) => record,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Upserted::Created(record) | Upserted::Existing(record) => record,
        }
    }
}

/// A tool known to the external registry, keyed by the qualified type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub select_menu_text: String,
    pub created_at: DateTime<Utc>,
}

/// One installed version of a tool on one execution host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersionRecord {
    pub id: Uuid,
    pub tool_id: Uuid,
    pub tool_key: String,
    pub host: String,
    pub version: String,
    pub description: Option<String>,
    pub docker_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create-unless-exists interface to the external tool registry.
#[cfg_attr(test, mockall::automock)]
pub trait ToolStore: Send + Sync {
    /// Return the tool record under `key`, creating it from `fields` if absent.
    fn upsert_tool(&self, key: &str, fields: &ToolFields) -> Result<Upserted<ToolRecord>>;

    /// Return the version record under `(tool, host, version)`, creating it
    /// from `fields` if absent.
    fn upsert_tool_version(
        &self,
        tool: &ToolRecord,
        host: &str,
        version: &str,
        fields: &ToolFields,
    ) -> Result<Upserted<ToolVersionRecord>>;
}

#[derive(Default)]
struct StoreState {
    tools: HashMap<String, ToolRecord>,
    versions: HashMap<(String, String, String), ToolVersionRecord>,
}

/// Process-local [`ToolStore`], used by the CLI and in tests.
#[derive(Default)]
pub struct InMemoryToolStore {
    state: Mutex<StoreState>,
}

impl InMemoryToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tool records.
    pub fn tool_count(&self) -> usize {
        self.state.lock().tools.len()
    }

    /// Number of tool-version records across all tools.
    pub fn version_count(&self) -> usize {
        self.state.lock().versions.len()
    }

    /// Clone of the tool record stored under `key`.
    pub fn tool(&self, key: &str) -> Option<ToolRecord> {
        self.state.lock().tools.get(key).cloned()
    }

    /// All version records of the tool stored under `key`, sorted by
    /// `(host, version)`.
    pub fn versions_of(&self, key: &str) -> Vec<ToolVersionRecord> {
        let state = self.state.lock();
        let mut records: Vec<ToolVersionRecord> = state
            .versions
            .values()
            .filter(|record| record.tool_key == key)
            .cloned()
            .collect();
        records.sort_by(|a, b| (&a.host, &a.version).cmp(&(&b.host, &b.version)));
        records
    }
}

impl ToolStore for InMemoryToolStore {
    fn upsert_tool(&self, key: &str, fields: &ToolFields) -> Result<Upserted<ToolRecord>> {
        let mut state = self.state.lock();
        if let Some(existing) = state.tools.get(key) {
            debug!(key = %key, "Tool record already exists");
            return Ok(Upserted::Existing(existing.clone()));
        }

        let record = ToolRecord {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: fields.name.clone(),
            description: fields.description.clone(),
            category: TOOL_CATEGORY.to_string(),
            select_menu_text: fields.select_menu_text(),
            created_at: Utc::now(),
        };
        info!(key = %key, id = %record.id, "Created tool record");
        state.tools.insert(key.to_string(), record.clone());
        Ok(Upserted::Created(record))
    }

    fn upsert_tool_version(
        &self,
        tool: &ToolRecord,
        host: &str,
        version: &str,
        fields: &ToolFields,
    ) -> Result<Upserted<ToolVersionRecord>> {
        let key = (tool.key.clone(), host.to_string(), version.to_string());
        let mut state = self.state.lock();
        if let Some(existing) = state.versions.get(&key) {
            debug!(tool = %tool.key, host = %host, version = %version, "Tool version record already exists");
            return Ok(Upserted::Existing(existing.clone()));
        }

        let record = ToolVersionRecord {
            id: Uuid::new_v4(),
            tool_id: tool.id,
            tool_key: tool.key.clone(),
            host: host.to_string(),
            version: version.to_string(),
            description: fields.description.clone(),
            docker_image: fields.docker_image.clone(),
            created_at: Utc::now(),
        };
        info!(tool = %tool.key, host = %host, version = %version, "Created tool version record");
        state.versions.insert(key, record.clone());
        Ok(Upserted::Created(record))
    }
}
