//! Definition loading and descriptor discovery for Taskforge
//!
//! This module turns generated task definition source into a `TaskDefinition`
//! and scans descriptor directories for `*.json` tool descriptors.
//!
//! # Definition format
//!
//! One directive per line; blank lines and `#` comments are ignored. Scalar
//! values are JSON literals, parameter lists are call-style JSON arguments:
//!
//! ```text
//! task FslBet
//! context worker
//! tool "fsl_bet"
//! version "6.0.4"
//! description null
//! image "mcin/fsl:6.0.4"
//! command "bet [INFILE] [MASK]"
//! input("infile", "File", false, "[INFILE]")
//! output("mask", "[INFILE]_mask.nii.gz", false)
//! end
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::descriptor::{is_canonical, Descriptor};
use crate::error::{ForgeError, Result};

use super::types::{DefinitionContext, InputSpec, OutputSpec, TaskDefinition};

static PARAM_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z_]{1,64}$").expect("parameter id pattern"));

/// A descriptor found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredDescriptor {
    pub path: PathBuf,
    pub descriptor: Descriptor,
}

/// Discover tool descriptors across multiple directories.
///
/// Scans each directory (non-recursively) for `*.json` files and loads each
/// as a descriptor. Missing directories are skipped; files that cannot be
/// read or are not JSON objects are logged as warnings and skipped. Results
/// are ordered by directory, then by file name, so the first descriptor seen
/// for a tool is stable across runs.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use taskforge::plugins::discover_descriptors;
///
/// let dirs = vec![PathBuf::from("/home/user/.taskforge/descriptors")];
/// for found in discover_descriptors(&dirs).unwrap() {
///     println!("{}: {:?}", found.path.display(), found.descriptor.name());
/// }
/// ```
pub fn discover_descriptors(dirs: &[PathBuf]) -> Result<Vec<DiscoveredDescriptor>> {
    let mut found = Vec::new();

    for dir in dirs {
        if !dir.exists() {
            info!(dir = %dir.display(), "Descriptor directory does not exist, skipping");
            continue;
        }

        if !dir.is_dir() {
            warn!(path = %dir.display(), "Descriptor path is not a directory, skipping");
            continue;
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            ForgeError::DescriptorLoad(format!(
                "Failed to read descriptor directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ForgeError::DescriptorLoad(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            match Descriptor::load(path.as_path()) {
                Ok(descriptor) => {
                    info!(
                        path = %path.display(),
                        tool = descriptor.name().unwrap_or("<unnamed>"),
                        version = descriptor.tool_version().unwrap_or("<none>"),
                        "Discovered descriptor"
                    );
                    found.push(DiscoveredDescriptor { path, descriptor });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load descriptor, skipping");
                }
            }
        }
    }

    Ok(found)
}

/// Parse generated definition source into a `TaskDefinition`.
///
/// The definition must declare `expected_identifier` and `context`; anything
/// else (unknown directive, malformed literal, missing `end`, failed
/// validation) is a `ForgeError::Load`. Parsing has no side effects, so a
/// failure here never leaves partial state behind.
pub fn load_definition(
    source: &str,
    expected_identifier: &str,
    context: DefinitionContext,
) -> Result<TaskDefinition> {
    let fail = |line: usize, message: String| {
        ForgeError::Load(format!(
            "{} ({} definition), line {}: {}",
            expected_identifier, context, line, message
        ))
    };

    let mut identifier = None;
    let mut declared_context = None;
    let mut tool = None;
    let mut version = None;
    let mut description = None;
    let mut image = None;
    let mut command = None;
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut ended = false;

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if ended {
            return Err(fail(line_no, "content after 'end'".to_string()));
        }

        let split = line
            .find(|c: char| !(c.is_ascii_lowercase() || c == '_'))
            .unwrap_or(line.len());
        let (keyword, rest) = line.split_at(split);
        let rest = rest.trim();

        match keyword {
            "task" => identifier = Some(rest.to_string()),
            "context" => {
                declared_context = Some(
                    rest.parse::<DefinitionContext>()
                        .map_err(|e| fail(line_no, e.to_string()))?,
                )
            }
            "tool" => tool = Some(string_literal(rest).map_err(|e| fail(line_no, e))?),
            "version" => version = Some(string_literal(rest).map_err(|e| fail(line_no, e))?),
            "description" => description = optional_literal(rest).map_err(|e| fail(line_no, e))?,
            "image" => image = optional_literal(rest).map_err(|e| fail(line_no, e))?,
            "command" => command = optional_literal(rest).map_err(|e| fail(line_no, e))?,
            "input" => inputs.push(parse_input(rest).map_err(|e| fail(line_no, e))?),
            "output" => outputs.push(parse_output(rest).map_err(|e| fail(line_no, e))?),
            "end" if rest.is_empty() => ended = true,
            _ => return Err(fail(line_no, format!("unknown directive '{}'", line))),
        }
    }

    let missing = |what: &str| {
        ForgeError::Load(format!(
            "{} ({} definition): missing '{}' directive",
            expected_identifier, context, what
        ))
    };
    if !ended {
        return Err(missing("end"));
    }

    let definition = TaskDefinition {
        identifier: identifier.ok_or_else(|| missing("task"))?,
        context: declared_context.ok_or_else(|| missing("context"))?,
        tool: tool.ok_or_else(|| missing("tool"))?,
        version: version.ok_or_else(|| missing("version"))?,
        description,
        image,
        command,
        inputs,
        outputs,
    };

    if definition.identifier != expected_identifier {
        return Err(ForgeError::Load(format!(
            "Definition declares task '{}' but was loaded as '{}'",
            definition.identifier, expected_identifier
        )));
    }
    if definition.context != context {
        return Err(ForgeError::Load(format!(
            "{}: expected a {} definition, found a {} definition",
            expected_identifier, context, definition.context
        )));
    }

    validate_definition(&definition)?;
    Ok(definition)
}

/// Validate a parsed definition.
///
/// Performs the following checks:
/// - The identifier is canonical (`[A-Z][A-Za-z0-9]*`)
/// - The version is non-empty
/// - Worker definitions carry a non-empty command
/// - Input and output ids are 1-64 word characters and unique
pub fn validate_definition(definition: &TaskDefinition) -> Result<()> {
    if !is_canonical(&definition.identifier) {
        return Err(ForgeError::Load(format!(
            "Invalid task identifier '{}': must match [A-Z][A-Za-z0-9]*",
            definition.identifier
        )));
    }

    if definition.version.trim().is_empty() {
        return Err(ForgeError::Load(format!(
            "Task '{}' has an empty version string",
            definition.identifier
        )));
    }

    if definition.context == DefinitionContext::Worker
        && definition.command.as_deref().map_or(true, |c| c.trim().is_empty())
    {
        return Err(ForgeError::Load(format!(
            "Worker definition of '{}' has no command",
            definition.identifier
        )));
    }

    let ids = definition
        .inputs
        .iter()
        .map(|input| ("input", input.id.as_str()))
        .chain(definition.outputs.iter().map(|output| ("output", output.id.as_str())));
    let mut seen = HashSet::new();
    for (what, id) in ids {
        if !PARAM_ID.is_match(id) {
            return Err(ForgeError::Load(format!(
                "Invalid {} id '{}' in task '{}'",
                what, id, definition.identifier
            )));
        }
        if !seen.insert((what, id)) {
            return Err(ForgeError::Load(format!(
                "Duplicate {} id '{}' in task '{}'",
                what, id, definition.identifier
            )));
        }
    }

    Ok(())
}

fn string_literal(text: &str) -> std::result::Result<String, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(s)) => Ok(s),
        Ok(other) => Err(format!("expected a string literal, found {}", other)),
        Err(e) => Err(format!("malformed literal '{}': {}", text, e)),
    }
}

fn optional_literal(text: &str) -> std::result::Result<Option<String>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => Ok(None),
        Ok(Value::String(s)) => Ok(Some(s)),
        Ok(other) => Err(format!("expected a string or null, found {}", other)),
        Err(e) => Err(format!("malformed literal '{}': {}", text, e)),
    }
}

fn call_args(text: &str, arity: usize) -> std::result::Result<Vec<Value>, String> {
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| format!("expected a parenthesized argument list, found '{}'", text))?;
    let args: Vec<Value> = serde_json::from_str(&format!("[{}]", inner))
        .map_err(|e| format!("malformed arguments '{}': {}", text, e))?;
    if args.len() != arity {
        return Err(format!("expected {} arguments, found {}", arity, args.len()));
    }
    Ok(args)
}

fn arg_str(args: &[Value], index: usize) -> std::result::Result<String, String> {
    args[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("argument {} must be a string", index + 1))
}

fn arg_bool(args: &[Value], index: usize) -> std::result::Result<bool, String> {
    args[index]
        .as_bool()
        .ok_or_else(|| format!("argument {} must be a boolean", index + 1))
}

fn parse_input(text: &str) -> std::result::Result<InputSpec, String> {
    let args = call_args(text, 4)?;
    let value_key = match &args[3] {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        _ => return Err("argument 4 must be a string or null".to_string()),
    };
    Ok(InputSpec {
        id: arg_str(&args, 0)?,
        kind: arg_str(&args, 1)?,
        optional: arg_bool(&args, 2)?,
        value_key,
    })
}

fn parse_output(text: &str) -> std::result::Result<OutputSpec, String> {
    let args = call_args(text, 3)?;
    Ok(OutputSpec {
        id: arg_str(&args, 0)?,
        path_template: arg_str(&args, 1)?,
        optional: arg_bool(&args, 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::descriptor::Schema;
    use crate::generator::{render, ArtifactKind};
    use serde_json::json;
    use tempfile::TempDir;

    const WORKER: &str = r#"# FslBet: worker task definition
task FslBet
context worker
tool "fsl_bet"
version "6.0.4"
description "Brain extraction"
image null
command "bet [INFILE] [MASK]"
input("infile", "File",   false, "[INFILE]")
input("frac",   "Number", true,  null)
output("mask", "[INFILE]_mask.nii.gz", false)
end
"#;

    fn write_descriptor(dir: &Path, file: &str, name: &str, version: &str) {
        let doc = json!({ "name": name, "tool-version": version, "command-line": "run" });
        fs::write(dir.join(file), serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    }

    // ---- load_definition tests ----

    #[test]
    fn test_load_worker_definition() {
        let def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        assert_eq!(def.identifier, "FslBet");
        assert_eq!(def.context, DefinitionContext::Worker);
        assert_eq!(def.tool, "fsl_bet");
        assert_eq!(def.version, "6.0.4");
        assert_eq!(def.description.as_deref(), Some("Brain extraction"));
        assert_eq!(def.image, None);
        assert_eq!(def.command.as_deref(), Some("bet [INFILE] [MASK]"));
        assert_eq!(def.inputs.len(), 2);
        assert_eq!(def.inputs[0].value_key.as_deref(), Some("[INFILE]"));
        assert!(def.inputs[1].optional);
        assert_eq!(def.outputs[0].path_template, "[INFILE]_mask.nii.gz");
    }

    #[test]
    fn test_load_rendered_definitions() {
        let schema = Schema::builtin().unwrap();
        let descriptor = Descriptor::from_value(json!({
            "name": "fsl_bet",
            "tool-version": "6.0.4",
            "command-line": "bet [INFILE]",
            "inputs": [{ "id": "infile", "name": "In", "type": "File", "value-key": "[INFILE]" }],
            "output-files": [{ "id": "mask", "name": "Mask", "path-template": "m.nii" }]
        }))
        .unwrap();
        let artifacts = render(&schema, &descriptor).unwrap();

        let client = load_definition(
            artifacts.get(ArtifactKind::ClientDefinition).unwrap(),
            "FslBet",
            DefinitionContext::Client,
        )
        .unwrap();
        assert_eq!(client.command, None);
        assert_eq!(client.inputs.len(), 1);

        let worker = load_definition(
            artifacts.get(ArtifactKind::WorkerDefinition).unwrap(),
            "FslBet",
            DefinitionContext::Worker,
        )
        .unwrap();
        assert_eq!(worker.command.as_deref(), Some("bet [INFILE]"));
        assert_eq!(worker.outputs.len(), 1);
    }

    #[test]
    fn test_load_rejects_identifier_mismatch() {
        let err = load_definition(WORKER, "Other", DefinitionContext::Worker).unwrap_err();
        assert!(matches!(err, ForgeError::Load(_)));
        assert!(err.to_string().contains("FslBet"));
    }

    #[test]
    fn test_load_rejects_context_mismatch() {
        let err = load_definition(WORKER, "FslBet", DefinitionContext::Client).unwrap_err();
        assert!(err.to_string().contains("expected a client definition"));
    }

    #[test]
    fn test_load_rejects_missing_end() {
        let source = WORKER.replace("end\n", "");
        let err = load_definition(&source, "FslBet", DefinitionContext::Worker).unwrap_err();
        assert!(err.to_string().contains("'end'"));
    }

    #[test]
    fn test_load_rejects_unknown_directive() {
        let source = WORKER.replace("image null", "launch_missiles now");
        let err = load_definition(&source, "FslBet", DefinitionContext::Worker).unwrap_err();
        assert!(err.to_string().contains("line 7"));
        assert!(err.to_string().contains("unknown directive"));
    }

    #[test]
    fn test_load_rejects_malformed_literal() {
        let source = WORKER.replace("version \"6.0.4\"", "version 6.0.4.1");
        assert!(load_definition(&source, "FslBet", DefinitionContext::Worker).is_err());
    }

    #[test]
    fn test_load_rejects_bad_arity() {
        let source = WORKER.replace("input(\"frac\",   \"Number\", true,  null)", "input(\"frac\")");
        let err = load_definition(&source, "FslBet", DefinitionContext::Worker).unwrap_err();
        assert!(err.to_string().contains("expected 4 arguments"));
    }

    #[test]
    fn test_load_rejects_content_after_end() {
        let source = format!("{}tool \"again\"\n", WORKER);
        assert!(load_definition(&source, "FslBet", DefinitionContext::Worker).is_err());
    }

    // ---- validate_definition tests ----

    #[test]
    fn test_validate_worker_without_command() {
        let mut def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        def.command = None;
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("has no command"));
    }

    #[test]
    fn test_validate_duplicate_input_ids() {
        let mut def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        def.inputs[1].id = "infile".to_string();
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("Duplicate input id"));
    }

    #[test]
    fn test_validate_input_and_output_may_share_id() {
        let mut def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        def.outputs[0].id = "infile".to_string();
        assert!(validate_definition(&def).is_ok());
    }

    #[test]
    fn test_validate_non_canonical_identifier() {
        let mut def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        def.identifier = "fsl_bet".to_string();
        assert!(validate_definition(&def).is_err());
    }

    #[test]
    fn test_validate_empty_version() {
        let mut def = load_definition(WORKER, "FslBet", DefinitionContext::Worker).unwrap();
        def.version = "  ".to_string();
        let err = validate_definition(&def).unwrap_err();
        assert!(err.to_string().contains("empty version"));
    }

    // ---- discover_descriptors tests ----

    #[test]
    fn test_discover_descriptors_sorted_by_file_name() {
        let tmp = TempDir::new().unwrap();
        write_descriptor(tmp.path(), "b.json", "tool_b", "1.0");
        write_descriptor(tmp.path(), "a.json", "tool_a", "1.0");
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let found = discover_descriptors(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<&str> = found.iter().map(|f| f.descriptor.name().unwrap()).collect();
        assert_eq!(names, vec!["tool_a", "tool_b"]);
    }

    #[test]
    fn test_discover_descriptors_nonexistent_directory() {
        let found = discover_descriptors(&[PathBuf::from("/nonexistent/path/descriptors")]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_discover_descriptors_skips_invalid_files() {
        let tmp = TempDir::new().unwrap();
        write_descriptor(tmp.path(), "good.json", "good", "1.0");
        fs::write(tmp.path().join("broken.json"), "{ broken json").unwrap();
        fs::write(tmp.path().join("array.json"), "[1, 2, 3]").unwrap();

        let found = discover_descriptors(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].descriptor.name(), Some("good"));
        assert_eq!(found[0].path, tmp.path().join("good.json"));
    }

    #[test]
    fn test_discover_descriptors_multiple_directories() {
        let tmp1 = TempDir::new().unwrap();
        let tmp2 = TempDir::new().unwrap();
        write_descriptor(tmp1.path(), "tool.json", "tool", "1.0");
        write_descriptor(tmp2.path(), "tool.json", "tool", "2.0");

        let found =
            discover_descriptors(&[tmp1.path().to_path_buf(), tmp2.path().to_path_buf()]).unwrap();
        let versions: Vec<&str> = found
            .iter()
            .map(|f| f.descriptor.tool_version().unwrap())
            .collect();
        assert_eq!(versions, vec!["1.0", "2.0"]);
    }
}
