//! Descriptor → plugin compiler.
//!
//! # Architecture
//!
//! - **templates**: the five fixed template bodies and artifact kinds
//! - **render**: pure template evaluation and the call-formatting helpers
//! - **artifacts**: `ArtifactSet`, `GeneratedPlugin`, and export to disk
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use taskforge::descriptor::{Descriptor, Schema};
//! use taskforge::generator::{generate, GenerationMode};
//!
//! let schema = Arc::new(Schema::builtin().unwrap());
//! let descriptor = Descriptor::load("fsl_bet.json").unwrap();
//! let plugin = generate(schema, descriptor, GenerationMode::Strict).unwrap();
//! plugin.export(Path::new("plugins")).unwrap();
//! ```

pub mod artifacts;
pub mod render;
pub mod templates;

use std::sync::Arc;

use tracing::{info, warn};

use crate::descriptor::{classify, Descriptor, Schema};
use crate::error::{ForgeError, Result};

pub use artifacts::{ArtifactSet, GeneratedPlugin};
pub use render::{aligned_calls, escape_html, format_call, render};
pub use templates::{ArtifactKind, ViewKind};

/// Whether validation failures abort generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Validation errors abort generation with `ForgeError::SchemaValidation`.
    #[default]
    Strict,
    /// Validation errors are recorded on the `GeneratedPlugin`; generation
    /// proceeds and may still fail with `ForgeError::Generation`.
    Permissive,
}

/// Validate a descriptor and compile it into a [`GeneratedPlugin`].
///
/// # Errors
/// - `ForgeError::SchemaValidation` in strict mode when validation fails
/// - `ForgeError::Generation` when a template cannot be evaluated
pub fn generate(
    schema: Arc<Schema>,
    descriptor: Descriptor,
    mode: GenerationMode,
) -> Result<GeneratedPlugin> {
    let validation_errors = schema.validate(&descriptor);
    if !validation_errors.is_empty() {
        match mode {
            GenerationMode::Strict => {
                return Err(ForgeError::SchemaValidation(validation_errors));
            }
            GenerationMode::Permissive => warn!(
                tool = descriptor.name().unwrap_or("<unnamed>"),
                errors = validation_errors.len(),
                "Generating despite validation errors"
            ),
        }
    }

    let identifier = classify(descriptor.name().unwrap_or_default());
    let artifacts = render(&schema, &descriptor)?;
    info!(
        identifier = %identifier,
        version = descriptor.tool_version().unwrap_or_default(),
        digest = %artifacts.digest(),
        "Generated plugin"
    );

    Ok(GeneratedPlugin {
        identifier,
        descriptor,
        schema,
        validation_errors,
        artifacts,
    })
}
