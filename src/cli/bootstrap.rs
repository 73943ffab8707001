//! Bootstrap command: integrate a directory of descriptors in-process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use taskforge::config::ForgeConfig;
use taskforge::plugins::{BootstrapOptions, InMemoryToolStore, Integrator, PluginRegistry};

use super::load_schema;

pub(crate) fn cmd_bootstrap(
    dirs: Vec<PathBuf>,
    schema: Option<String>,
    multi_version: bool,
) -> Result<()> {
    let config = ForgeConfig::load().with_context(|| "Failed to load configuration")?;
    let context = config.execution_context()?;
    let dirs = if dirs.is_empty() {
        config.descriptor_dir_paths()
    } else {
        dirs
    };

    let registry = Arc::new(PluginRegistry::new());
    let store = Arc::new(InMemoryToolStore::new());
    let integrator = Integrator::new(
        Arc::clone(&registry),
        store.clone(),
        context,
        config.help_root_path(),
    );

    let options = BootstrapOptions {
        mode: config.generation_mode(),
        force_multi_version: multi_version,
        create_version_records: config.create_version_records,
    };
    let report = integrator.bootstrap(load_schema(schema)?, &dirs, options, |name| {
        config.is_tool_permitted(name)
    })?;

    println!("Integrated {} descriptor(s):", report.integrated.len());
    for tool in &report.integrated {
        println!(
            "  {:<24} {:<12} {} ({})",
            tool.identifier,
            tool.version,
            tool.type_name,
            tool.path.display()
        );
    }
    if !report.skipped.is_empty() {
        println!("Skipped {} descriptor(s):", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    println!(
        "Registry: {} identifier(s), {} tool record(s), {} version record(s)",
        registry.len(),
        store.tool_count(),
        store.version_count()
    );
    Ok(())
}
