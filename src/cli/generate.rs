//! Generate command: descriptor in, exported plugin out.

use std::path::PathBuf;

use anyhow::{Context, Result};

use taskforge::config::ForgeConfig;
use taskforge::descriptor::Descriptor;
use taskforge::generator::{generate, GenerationMode};

use super::load_schema;

pub(crate) fn cmd_generate(
    descriptor: String,
    schema: Option<String>,
    out: Option<PathBuf>,
    permissive: bool,
) -> Result<()> {
    let config = ForgeConfig::load().with_context(|| "Failed to load configuration")?;
    let schema = load_schema(schema)?;
    let descriptor = Descriptor::load(descriptor).with_context(|| "Failed to load descriptor")?;

    let mode = if permissive {
        GenerationMode::Permissive
    } else {
        config.generation_mode()
    };
    let plugin = generate(schema, descriptor, mode)?;
    for error in &plugin.validation_errors {
        eprintln!("warning: {}", error);
    }

    let base = out.unwrap_or_else(|| config.export_root_path());
    let root = plugin
        .export(&base)
        .with_context(|| format!("Failed to export plugin to {}", base.display()))?;

    println!("Identifier: {}", plugin.identifier);
    println!("Version:    {}", plugin.version());
    println!("Exported:   {}", root.display());
    println!("Digest:     {}", plugin.artifacts.digest());
    Ok(())
}
