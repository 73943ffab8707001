//! Template rendering: descriptor + schema → artifact set.
//!
//! Rendering is a pure function of `(schema, descriptor)` and the fixed
//! template bodies in [`super::templates`]. Nothing else (time, environment,
//! map iteration order) influences the output, so rendering the same pair
//! twice yields byte-identical artifacts.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::descriptor::{classify, snake_case, Descriptor, Schema};
use crate::error::{ForgeError, Result};

use super::artifacts::ArtifactSet;
use super::templates::ArtifactKind;

/// Render all five artifacts for a descriptor.
///
/// # Errors
/// `ForgeError::Generation` when a template references a descriptor field
/// that is missing, or when descriptor content cannot be shaped into the
/// generated source (e.g. an input without an `id`).
pub fn render(schema: &Schema, descriptor: &Descriptor) -> Result<ArtifactSet> {
    let identifier = classify(descriptor.name().unwrap_or_default());
    let binding = Binding {
        schema,
        descriptor,
        snake_name: snake_case(&identifier),
        identifier,
    };

    let mut bodies = BTreeMap::new();
    for kind in ArtifactKind::ALL {
        let body = render_template(kind.name(), kind.template(), &binding)?;
        bodies.insert(kind, body);
    }
    Ok(ArtifactSet::new(bodies))
}

/// Everything a template can see.
struct Binding<'a> {
    schema: &'a Schema,
    descriptor: &'a Descriptor,
    identifier: String,
    snake_name: String,
}

impl Binding<'_> {
    /// Resolve a placeholder path. Absent optional fields resolve to null.
    fn resolve(&self, path: &str, optional: bool) -> std::result::Result<Value, String> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        match (root, rest) {
            ("identifier", None) => Ok(Value::String(self.identifier.clone())),
            ("snake_name", None) => Ok(Value::String(self.snake_name.clone())),
            ("descriptor", Some(field)) => match self.descriptor.lookup(field) {
                Some(value) => Ok(value.clone()),
                None if optional => Ok(Value::Null),
                None => Err(format!("missing descriptor field '{}'", field)),
            },
            ("schema", Some(field)) => match self.schema.lookup(field) {
                Some(value) => Ok(value.clone()),
                None if optional => Ok(Value::Null),
                None => Err(format!("missing schema entry '{}'", field)),
            },
            ("helper", Some(name)) => self.helper(name),
            _ => Err(format!("unknown placeholder '{}'", path)),
        }
    }

    fn helper(&self, name: &str) -> std::result::Result<Value, String> {
        let d = self.descriptor;
        let text = match name {
            "docker_image" => return Ok(d.docker_image().map_or(Value::Null, Value::from)),
            "input_declarations" => input_declarations(d)?,
            "output_declarations" => output_declarations(d)?,
            "params_form_rows" => params_form_rows(d)?,
            "show_rows" => show_rows(d)?,
            "help_input_rows" => help_input_rows(d)?,
            "help_output_rows" => help_output_rows(d)?,
            other => return Err(format!("unknown helper '{}'", other)),
        };
        Ok(Value::String(text))
    }
}

/// Evaluate one template body against a binding.
fn render_template(template: &str, body: &str, binding: &Binding<'_>) -> Result<String> {
    let fail = |message: String| ForgeError::Generation {
        template: template.to_string(),
        message,
    };

    let mut out = String::with_capacity(body.len() * 2);
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| fail("unterminated placeholder".to_string()))?;
        let expr = &after[..end];
        out.push_str(&evaluate(expr, binding).map_err(fail)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn evaluate(expr: &str, binding: &Binding<'_>) -> std::result::Result<String, String> {
    let mut parts = expr.split('|').map(str::trim);
    let path = parts.next().unwrap_or_default();
    let (path, optional) = match path.strip_suffix('?') {
        Some(p) => (p.trim_end(), true),
        None => (path, false),
    };
    if path.is_empty() {
        return Err("empty placeholder".to_string());
    }

    let mut value = binding.resolve(path, optional)?;
    for filter in parts {
        value = match filter {
            "json" => Value::String(
                serde_json::to_string(&value).map_err(|e| format!("json filter: {}", e))?,
            ),
            "html" => Value::String(escape_html(&value_text(&value))),
            other => return Err(format!("unknown filter '{}'", other)),
        };
    }
    Ok(value_text(&value))
}

/// Text form of a resolved value: strings raw, null empty, the rest as JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape text for inclusion in HTML markup or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ----------------------------------------------------------------------------
// Call formatting
// ----------------------------------------------------------------------------

/// Format a call with each argument left-justified to the given column
/// width, so that consecutive calls line up:
///
/// ```
/// use taskforge::generator::format_call;
///
/// let args = vec!["\"in\"".to_string(), "\"File\"".to_string()];
/// assert_eq!(format_call("input", &args, &[4, 6]), "input(\"in\", \"File\")");
/// ```
///
/// The comma is attached to its argument before padding; the last argument
/// is never padded.
pub fn format_call(name: &str, args: &[String], widths: &[usize]) -> String {
    let last = args.len().saturating_sub(1);
    let formatted: Vec<String> = args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == last {
                arg.clone()
            } else {
                let width = widths.get(i).copied().unwrap_or(0) + 1;
                format!("{:<width$}", format!("{},", arg), width = width)
            }
        })
        .collect();
    format!("{}({})", name, formatted.join(" "))
}

/// Format one call per row with columns aligned across all rows.
pub fn aligned_calls(name: &str, rows: &[Vec<String>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            rows.iter()
                .filter_map(|row| row.get(col))
                .map(|arg| arg.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();
    rows.iter()
        .map(|row| format_call(name, row, &widths))
        .collect()
}

// ----------------------------------------------------------------------------
// Descriptor helpers
// ----------------------------------------------------------------------------

fn literal(value: &Value) -> String {
    // Serializing a serde_json::Value cannot fail.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn required_str<'v>(entry: &'v Value, key: &str, what: &str, index: usize) -> std::result::Result<&'v str, String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{} #{} has no string '{}'", what, index, key))
}

fn flag(entry: &Value, key: &str) -> bool {
    entry.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn input_declarations(d: &Descriptor) -> std::result::Result<String, String> {
    let mut rows = Vec::new();
    for (i, input) in d.inputs().iter().enumerate() {
        let id = required_str(input, "id", "input", i)?;
        let kind = required_str(input, "type", "input", i)?;
        rows.push(vec![
            literal(&Value::from(id)),
            literal(&Value::from(kind)),
            literal(&Value::Bool(flag(input, "optional"))),
            literal(input.get("value-key").unwrap_or(&Value::Null)),
        ]);
    }
    Ok(aligned_calls("input", &rows).join("\n"))
}

fn output_declarations(d: &Descriptor) -> std::result::Result<String, String> {
    let mut rows = Vec::new();
    for (i, output) in d.output_files().iter().enumerate() {
        let id = required_str(output, "id", "output", i)?;
        let template = required_str(output, "path-template", "output", i)?;
        rows.push(vec![
            literal(&Value::from(id)),
            literal(&Value::from(template)),
            literal(&Value::Bool(flag(output, "optional"))),
        ]);
    }
    Ok(aligned_calls("output", &rows).join("\n"))
}

fn display_name<'v>(entry: &'v Value, id: &'v str) -> &'v str {
    entry.get("name").and_then(Value::as_str).unwrap_or(id)
}

fn params_form_rows(d: &Descriptor) -> std::result::Result<String, String> {
    let mut lines = Vec::new();
    for (i, input) in d.inputs().iter().enumerate() {
        let id = required_str(input, "id", "input", i)?;
        let kind = required_str(input, "type", "input", i)?;
        let label = escape_html(display_name(input, id));
        let field = format!("params[{}]", escape_html(id));
        let default = input.get("default-value").map(value_text).unwrap_or_default();
        let required = if flag(input, "optional") { "" } else { " required" };

        let widget = match (kind, input.get("value-choices").and_then(Value::as_array)) {
            (_, Some(choices)) => {
                let options: String = choices
                    .iter()
                    .map(|choice| {
                        let text = escape_html(&value_text(choice));
                        let selected = if value_text(choice) == default { " selected" } else { "" };
                        format!("<option value=\"{}\"{}>{}</option>", text, selected, text)
                    })
                    .collect();
                format!("<select name=\"{}\"{}>{}</select>", field, required, options)
            }
            ("Flag", None) => {
                let checked = if default == "true" { " checked" } else { "" };
                format!("<input type=\"checkbox\" name=\"{}\" value=\"1\"{}>", field, checked)
            }
            ("Number", None) => format!(
                "<input type=\"number\" step=\"any\" name=\"{}\" value=\"{}\"{}>",
                field,
                escape_html(&default),
                required
            ),
            ("File", None) => format!(
                "<select name=\"{}\" data-kind=\"file\"{}></select>",
                field, required
            ),
            (_, None) => format!(
                "<input type=\"text\" name=\"{}\" value=\"{}\"{}>",
                field,
                escape_html(&default),
                required
            ),
        };
        lines.push(format!(
            "    <tr><th><label for=\"{}\">{}</label></th><td>{}</td></tr>",
            field, label, widget
        ));
    }
    Ok(lines.join("\n"))
}

fn show_rows(d: &Descriptor) -> std::result::Result<String, String> {
    let mut lines = Vec::new();
    for (i, input) in d.inputs().iter().enumerate() {
        let id = required_str(input, "id", "input", i)?;
        lines.push(format!(
            "  <tr><th>{}</th><td data-param=\"{}\"></td></tr>",
            escape_html(display_name(input, id)),
            escape_html(id)
        ));
    }
    Ok(lines.join("\n"))
}

fn help_input_rows(d: &Descriptor) -> std::result::Result<String, String> {
    let mut lines = Vec::new();
    for (i, input) in d.inputs().iter().enumerate() {
        let id = required_str(input, "id", "input", i)?;
        let kind = input.get("type").and_then(Value::as_str).unwrap_or("String");
        let qualifier = if flag(input, "optional") { ", optional" } else { "" };
        let description = input.get("description").and_then(Value::as_str).unwrap_or("");
        lines.push(format!(
            "    <dt>{} <code>{}</code> ({}{})</dt>\n    <dd>{}</dd>",
            escape_html(display_name(input, id)),
            escape_html(id),
            escape_html(kind),
            qualifier,
            escape_html(description)
        ));
    }
    Ok(lines.join("\n"))
}

fn help_output_rows(d: &Descriptor) -> std::result::Result<String, String> {
    let mut lines = Vec::new();
    for (i, output) in d.output_files().iter().enumerate() {
        let id = required_str(output, "id", "output", i)?;
        let template = output.get("path-template").and_then(Value::as_str).unwrap_or("");
        lines.push(format!(
            "    <dt>{} <code>{}</code></dt>\n    <dd>{}</dd>",
            escape_html(display_name(output, id)),
            escape_html(template),
            escape_html(output.get("description").and_then(Value::as_str).unwrap_or(""))
        ));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bet() -> Descriptor {
        Descriptor::from_value(json!({
            "name": "fsl_bet",
            "tool-version": "6.0.4",
            "description": "Brain <extraction> & masking",
            "command-line": "bet [INFILE] [MASK] [FRAC]",
            "docker-image": "mcin/fsl:6.0.4",
            "inputs": [
                { "id": "infile", "name": "Input image", "type": "File", "value-key": "[INFILE]" },
                { "id": "frac", "name": "Threshold", "type": "Number", "optional": true,
                  "value-key": "[FRAC]", "default-value": 0.5 },
                { "id": "robust", "name": "Robust", "type": "Flag", "optional": true },
                { "id": "mode", "name": "Mode", "type": "String", "value-choices": ["fast", "slow"],
                  "default-value": "slow" }
            ],
            "output-files": [
                { "id": "mask", "name": "Mask", "path-template": "[INFILE]_mask.nii.gz" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_render_produces_all_kinds() {
        let schema = Schema::builtin().unwrap();
        let artifacts = render(&schema, &bet()).unwrap();
        for kind in ArtifactKind::ALL {
            assert!(!artifacts.get(kind).unwrap().is_empty(), "{} empty", kind);
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let schema = Schema::builtin().unwrap();
        let first = render(&schema, &bet()).unwrap();
        let second = render(&schema, &bet()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_worker_definition_content() {
        let schema = Schema::builtin().unwrap();
        let artifacts = render(&schema, &bet()).unwrap();
        let worker = artifacts.get(ArtifactKind::WorkerDefinition).unwrap();

        assert!(worker.contains("task FslBet\n"));
        assert!(worker.contains("context worker\n"));
        assert!(worker.contains("command \"bet [INFILE] [MASK] [FRAC]\"\n"));
        assert!(worker.contains("image \"mcin/fsl:6.0.4\"\n"));
        assert!(worker.contains(
            "# schema \"https://taskforge.dev/schemas/descriptor-0.5.json\""
        ));
        assert!(worker.contains("input(\"infile\", \"File\",   false, \"[INFILE]\")"));
        assert!(worker.contains("input(\"robust\", \"Flag\",   true,  null)"));
        assert!(worker.trim_end().ends_with("end"));
    }

    #[test]
    fn test_client_definition_has_no_command() {
        let schema = Schema::builtin().unwrap();
        let artifacts = render(&schema, &bet()).unwrap();
        let client = artifacts.get(ArtifactKind::ClientDefinition).unwrap();
        assert!(client.contains("context client\n"));
        assert!(!client.contains("\ncommand "));
    }

    #[test]
    fn test_html_views_escape_descriptor_text() {
        let schema = Schema::builtin().unwrap();
        let artifacts = render(&schema, &bet()).unwrap();
        let help = artifacts.get(ArtifactKind::HelpTemplate).unwrap();
        assert!(help.contains("Brain &lt;extraction&gt; &amp; masking"));
        assert!(help.contains("<dt>Threshold <code>frac</code> (Number, optional)</dt>"));

        let params = artifacts.get(ArtifactKind::ParamsTemplate).unwrap();
        assert!(params.contains("href=\"/help/FslBet_help.html\""));
        assert!(params.contains("<option value=\"slow\" selected>slow</option>"));
        assert!(params.contains("type=\"number\" step=\"any\" name=\"params[frac]\" value=\"0.5\">"));
        assert!(params.contains("data-kind=\"file\" required"));
    }

    #[test]
    fn test_missing_field_is_generation_error() {
        let schema = Schema::builtin().unwrap();
        let mut value = bet().to_value();
        value.as_object_mut().unwrap().remove("command-line");
        let err = render(&schema, &Descriptor::from_value(value).unwrap()).unwrap_err();
        match err {
            ForgeError::Generation { template, message } => {
                assert_eq!(template, "worker-definition");
                assert!(message.contains("command-line"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_input_is_generation_error() {
        let schema = Schema::builtin().unwrap();
        let mut value = bet().to_value();
        value["inputs"][1].as_object_mut().unwrap().remove("id");
        let err = render(&schema, &Descriptor::from_value(value).unwrap()).unwrap_err();
        assert!(matches!(err, ForgeError::Generation { .. }));
        assert!(err.to_string().contains("input #1"));
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let schema = Schema::builtin().unwrap();
        let d = Descriptor::from_value(json!({
            "name": "echo",
            "tool-version": "1",
            "command-line": "echo"
        }))
        .unwrap();
        let artifacts = render(&schema, &d).unwrap();
        let client = artifacts.get(ArtifactKind::ClientDefinition).unwrap();
        assert!(client.contains("description null\n"));
        assert!(client.contains("image null\n"));
    }

    #[test]
    fn test_unterminated_and_unknown_placeholders() {
        let schema = Schema::builtin().unwrap();
        let d = bet();
        let binding = Binding {
            schema: &schema,
            descriptor: &d,
            identifier: "FslBet".to_string(),
            snake_name: "fsl_bet".to_string(),
        };
        assert!(render_template("t", "a {{identifier", &binding).is_err());
        assert!(render_template("t", "{{nope}}", &binding).is_err());
        assert!(render_template("t", "{{helper.nope}}", &binding).is_err());
        assert!(render_template("t", "{{identifier | shout}}", &binding).is_err());
        assert_eq!(
            render_template("t", "{{ snake_name }}/{{descriptor.missing?}}!", &binding).unwrap(),
            "fsl_bet/!"
        );
    }

    #[test]
    fn test_format_call_alignment() {
        let rows = vec![
            vec!["\"a\"".to_string(), "\"File\"".to_string(), "true".to_string()],
            vec!["\"long_id\"".to_string(), "\"Number\"".to_string(), "false".to_string()],
        ];
        let calls = aligned_calls("input", &rows);
        assert_eq!(calls[0], "input(\"a\",       \"File\",   true)");
        assert_eq!(calls[1], "input(\"long_id\", \"Number\", false)");
    }

    #[test]
    fn test_format_call_edge_cases() {
        assert_eq!(format_call("f", &[], &[]), "f()");
        assert_eq!(format_call("f", &["x".to_string()], &[10]), "f(x)");
    }
}
