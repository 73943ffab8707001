//! Command handlers for the `taskforge` binary.

mod bootstrap;
mod generate;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use taskforge::descriptor::{classify, Schema};

pub(crate) use bootstrap::cmd_bootstrap;
pub(crate) use generate::cmd_generate;

/// Load the schema named on the command line, or the bundled one.
pub(crate) fn load_schema(source: Option<String>) -> Result<Arc<Schema>> {
    let schema = match source {
        Some(source) => Schema::load(source).with_context(|| "Failed to load schema")?,
        None => Schema::builtin().with_context(|| "Failed to load bundled schema")?,
    };
    Ok(Arc::new(schema))
}

/// Validate one descriptor; fails when any validation error is found.
pub(crate) fn cmd_validate(descriptor: String, schema: Option<String>) -> Result<()> {
    let schema = load_schema(schema)?;
    let errors = schema
        .validate_source(descriptor.as_str())
        .with_context(|| "Failed to load descriptor")?;

    if errors.is_empty() {
        println!("Descriptor is valid");
        return Ok(());
    }

    for error in &errors {
        println!("{}", error);
    }
    bail!("Descriptor has {} validation error(s)", errors.len())
}

pub(crate) fn cmd_classify(name: &str) {
    println!("{}", classify(name));
}
