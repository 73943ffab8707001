//! Generated artifact bundles and their export to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::descriptor::{snake_case, Descriptor, Schema, ValidationError};
use crate::error::{ForgeError, Result};

use super::templates::ArtifactKind;

/// Immutable mapping from artifact kind to generated source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    bodies: BTreeMap<ArtifactKind, String>,
}

impl ArtifactSet {
    pub(crate) fn new(bodies: BTreeMap<ArtifactKind, String>) -> Self {
        Self { bodies }
    }

    /// Generated text for one kind.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        self.bodies.get(&kind).map(String::as_str)
    }

    /// Iterate over `(kind, body)` pairs in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str)> {
        self.bodies.iter().map(|(kind, body)| (*kind, body.as_str()))
    }

    /// Number of artifacts in the set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Hex SHA-256 over every kind name and body, in kind order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (kind, body) in &self.bodies {
            hasher.update(kind.name().as_bytes());
            hasher.update([0u8]);
            hasher.update(body.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Write the set under `base_path/<snake_case(identifier)>/` using the
    /// fixed layout:
    ///
    /// ```text
    /// <root>/client/<name>.task
    /// <root>/worker/<name>.task
    /// <root>/views/_task_params.html
    /// <root>/views/_show_params.html
    /// <root>/views/public/edit_params_help.html
    /// ```
    ///
    /// Existing files are overwritten. On failure, files already written are
    /// left in place and the filesystem error is returned unmasked.
    ///
    /// # Returns
    /// The export root directory.
    pub fn export(&self, identifier: &str, base_path: &Path) -> Result<PathBuf> {
        let snake = snake_case(identifier);
        let root = base_path.join(&snake);

        for (kind, body) in &self.bodies {
            let path = root.join(kind.export_path(&snake));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|source| ForgeError::Export {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::write(&path, body).map_err(|source| ForgeError::Export {
                path: path.clone(),
                source,
            })?;
            debug!(kind = %kind, path = %path.display(), "Wrote artifact");
        }

        info!(identifier = %identifier, root = %root.display(), "Exported artifact set");
        Ok(root)
    }
}

/// Result of compiling one descriptor.
///
/// Owned by the caller until integration; the registry keeps only an `Arc`
/// back-reference for introspection.
#[derive(Debug, Clone)]
pub struct GeneratedPlugin {
    /// Canonical type identifier derived from the descriptor name.
    pub identifier: String,
    /// The descriptor the artifacts were generated from.
    pub descriptor: Descriptor,
    /// The schema the descriptor was validated against.
    pub schema: Arc<Schema>,
    /// Validation problems; non-empty only in permissive mode.
    pub validation_errors: Vec<ValidationError>,
    /// The generated sources.
    pub artifacts: ArtifactSet,
}

impl GeneratedPlugin {
    /// Whether the descriptor validated cleanly.
    pub fn is_valid(&self) -> bool {
        self.validation_errors.is_empty()
    }

    /// Tool version from the descriptor (empty when absent).
    pub fn version(&self) -> &str {
        self.descriptor.tool_version().unwrap_or_default()
    }

    /// Export the artifacts under `base_path`. See [`ArtifactSet::export`].
    pub fn export(&self, base_path: &Path) -> Result<PathBuf> {
        self.artifacts.export(&self.identifier, base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_set() -> ArtifactSet {
        let bodies = ArtifactKind::ALL
            .iter()
            .map(|kind| (*kind, format!("body of {}\n", kind)))
            .collect();
        ArtifactSet::new(bodies)
    }

    #[test]
    fn test_export_round_trip() {
        let tmp = TempDir::new().unwrap();
        let set = sample_set();
        let root = set.export("FslBet", tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join("fsl_bet"));

        for (kind, body) in set.iter() {
            let written = fs::read_to_string(root.join(kind.export_path("fsl_bet"))).unwrap();
            assert_eq!(written, body);
        }
        assert!(root.join("client/fsl_bet.task").is_file());
        assert!(root.join("worker/fsl_bet.task").is_file());
        assert!(root.join("views/_task_params.html").is_file());
        assert!(root.join("views/_show_params.html").is_file());
        assert!(root.join("views/public/edit_params_help.html").is_file());
    }

    #[test]
    fn test_export_overwrites_existing_files() {
        let tmp = TempDir::new().unwrap();
        let stale = tmp.path().join("fsl_bet/client/fsl_bet.task");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "stale content").unwrap();

        let set = sample_set();
        set.export("FslBet", tmp.path()).unwrap();
        set.export("FslBet", tmp.path()).unwrap();

        assert_eq!(
            fs::read_to_string(&stale).unwrap(),
            set.get(ArtifactKind::ClientDefinition).unwrap()
        );
    }

    #[test]
    fn test_export_failure_wraps_io_error() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the export root directory should go.
        fs::write(tmp.path().join("fsl_bet"), "in the way").unwrap();

        let err = sample_set().export("FslBet", tmp.path()).unwrap_err();
        match err {
            ForgeError::Export { path, .. } => assert!(path.starts_with(tmp.path().join("fsl_bet"))),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = sample_set();
        let b = sample_set();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);

        let mut bodies = a.bodies.clone();
        bodies.insert(ArtifactKind::HelpTemplate, "changed".to_string());
        assert_ne!(ArtifactSet::new(bodies).digest(), a.digest());
    }
}
