//! Descriptor schema loading and structural validation.
//!
//! A [`Schema`] is parsed and compiled once at construction and is read-only
//! afterwards. Besides validation it behaves as a nested JSON mapping
//! (`schema["properties"]["inputs"]`) so generation templates can query
//! arbitrary schema metadata such as enumerated constraints.

use std::fmt;
use std::ops::Index;

use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use crate::error::{ForgeError, Result};

use super::types::{json_kind, Descriptor, DocumentSource, ValidationError};

/// The descriptor schema bundled with this crate.
pub const BUILTIN_SCHEMA: &str = include_str!("../../schemas/descriptor.schema.json");

/// An immutable structural ruleset for descriptors.
pub struct Schema {
    document: Value,
    validator: Validator,
}

impl Schema {
    /// Load a schema from a path, raw text, or parsed document.
    ///
    /// # Errors
    /// `ForgeError::SchemaLoad` if the source cannot be read or parsed, or
    /// if the document is not a valid JSON Schema.
    pub fn load(source: impl Into<DocumentSource>) -> Result<Self> {
        let document = source.into().parse().map_err(ForgeError::SchemaLoad)?;
        Self::from_value(document)
    }

    /// Compile an already-parsed schema document.
    pub fn from_value(document: Value) -> Result<Self> {
        if !document.is_object() {
            return Err(ForgeError::SchemaLoad(format!(
                "schema must be a JSON object, got {}",
                json_kind(&document)
            )));
        }
        let validator = jsonschema::options()
            .build(&document)
            .map_err(|e| ForgeError::SchemaLoad(format!("invalid schema: {}", e)))?;
        let id = document
            .get("$id")
            .and_then(|v| v.as_str())
            .unwrap_or("<anonymous>");
        debug!(id, "Compiled descriptor schema");
        Ok(Self {
            document,
            validator,
        })
    }

    /// The schema bundled with this crate.
    pub fn builtin() -> Result<Self> {
        Self::load(DocumentSource::Text(BUILTIN_SCHEMA.to_string()))
    }

    /// The raw schema document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Top-level key lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Nested lookup by a dotted path (`properties.schema-version.enum`).
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        dotted.split('.').try_fold(&self.document, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
            _ => None,
        })
    }

    /// Enumerated values allowed for a top-level descriptor property, if the
    /// schema constrains it.
    pub fn enumerated(&self, property: &str) -> Vec<&str> {
        self.document
            .get("properties")
            .and_then(|p| p.get(property))
            .and_then(|p| p.get("enum"))
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Validate a descriptor, returning every structural problem found.
    ///
    /// An empty list means the descriptor is valid. Validation failures are
    /// never reported as `Err`.
    pub fn validate(&self, descriptor: &Descriptor) -> Vec<ValidationError> {
        let instance = descriptor.to_value();
        self.validate_value(&instance)
    }

    /// Load a descriptor document and validate it.
    ///
    /// # Errors
    /// `ForgeError::DescriptorLoad` only when the document itself is
    /// malformed; validation problems are returned in the `Ok` list.
    pub fn validate_source(&self, source: impl Into<DocumentSource>) -> Result<Vec<ValidationError>> {
        let descriptor = Descriptor::load(source)?;
        Ok(self.validate(&descriptor))
    }

    /// Strict variant of [`Schema::validate`].
    ///
    /// # Errors
    /// `ForgeError::SchemaValidation` carrying the full error list when the
    /// descriptor is invalid.
    pub fn validate_strict(&self, descriptor: &Descriptor) -> Result<()> {
        let errors = self.validate(descriptor);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ForgeError::SchemaValidation(errors))
        }
    }

    fn validate_value(&self, instance: &Value) -> Vec<ValidationError> {
        self.validator
            .iter_errors(instance)
            .map(|error| {
                let mut path = split_pointer(&error.instance_path.to_string());
                // Required-property errors point at the parent object; extend
                // the path so it names the missing field itself.
                if let ValidationErrorKind::Required { property } = &error.kind {
                    match property {
                        Value::String(name) => path.push(name.clone()),
                        other => path.push(other.to_string()),
                    }
                }
                ValidationError::new(path, error.to_string())
            })
            .collect()
    }
}

impl Index<&str> for Schema {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        &self.document[key]
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.document.get("$id"))
            .field("title", &self.document.get("title"))
            .finish_non_exhaustive()
    }
}

/// Split a JSON pointer into unescaped segments.
fn split_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_descriptor() -> Descriptor {
        Descriptor::from_value(json!({
            "name": "fsl_bet",
            "tool-version": "6.0.4",
            "schema-version": "0.5",
            "description": "Brain extraction",
            "command-line": "bet [INFILE] [MASK] [FRAC]",
            "docker-image": "mcin/fsl:6.0.4",
            "inputs": [
                { "id": "infile", "name": "Input image", "type": "File", "value-key": "[INFILE]" },
                { "id": "frac", "name": "Threshold", "type": "Number", "optional": true, "value-key": "[FRAC]" }
            ],
            "output-files": [
                { "id": "mask", "name": "Mask", "path-template": "[INFILE]_mask.nii.gz" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_builtin_schema_loads() {
        let schema = Schema::builtin().unwrap();
        assert_eq!(schema["type"], json!("object"));
        assert!(schema.get("properties").is_some());
        assert_eq!(schema["no-such-key"], Value::Null);
    }

    #[test]
    fn test_valid_descriptor_has_no_errors() {
        let schema = Schema::builtin().unwrap();
        assert!(schema.validate(&valid_descriptor()).is_empty());
        assert!(schema.validate_strict(&valid_descriptor()).is_ok());
    }

    #[test]
    fn test_missing_required_field_path_names_field() {
        let schema = Schema::builtin().unwrap();
        for field in ["name", "tool-version", "command-line"] {
            let mut value = valid_descriptor().to_value();
            value.as_object_mut().unwrap().remove(field);
            let descriptor = Descriptor::from_value(value).unwrap();

            let errors = schema.validate(&descriptor);
            assert!(
                errors.iter().any(|e| e.path == vec![field.to_string()]),
                "no error with path [{}] in {:?}",
                field,
                errors
            );
        }
    }

    #[test]
    fn test_type_and_enum_violations() {
        let schema = Schema::builtin().unwrap();
        let mut value = valid_descriptor().to_value();
        value["tool-version"] = json!(6);
        value["inputs"][0]["type"] = json!("Blob");
        let errors = schema.validate(&Descriptor::from_value(value).unwrap());

        assert!(errors.iter().any(|e| e.path == vec!["tool-version"]));
        assert!(errors.iter().any(|e| e.path == vec!["inputs", "0", "type"]));
    }

    #[test]
    fn test_param_ids_capped_at_64_chars() {
        let schema = Schema::builtin().unwrap();
        let mut value = valid_descriptor().to_value();
        value["inputs"][0]["id"] = json!("a".repeat(64));
        assert!(schema.validate(&Descriptor::from_value(value.clone()).unwrap()).is_empty());

        value["inputs"][0]["id"] = json!("a".repeat(65));
        let errors = schema.validate(&Descriptor::from_value(value).unwrap());
        assert!(errors.iter().any(|e| e.path == vec!["inputs", "0", "id"]));
    }

    #[test]
    fn test_strict_mode_carries_all_errors() {
        let schema = Schema::builtin().unwrap();
        let descriptor = Descriptor::from_value(json!({ "description": "nothing else" })).unwrap();
        let err = schema.validate_strict(&descriptor).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), schema.validate(&descriptor).len());
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_validate_source_rejects_malformed_input() {
        let schema = Schema::builtin().unwrap();
        let err = schema
            .validate_source(DocumentSource::Text("{ broken".to_string()))
            .unwrap_err();
        assert!(matches!(err, ForgeError::DescriptorLoad(_)));

        let errors = schema
            .validate_source(DocumentSource::Value(json!({ "name": "x" })))
            .unwrap();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_schema_load_errors() {
        assert!(matches!(
            Schema::load("/nonexistent/schema.json").unwrap_err(),
            ForgeError::SchemaLoad(_)
        ));
        assert!(matches!(
            Schema::load(DocumentSource::Value(json!("not a schema"))).unwrap_err(),
            ForgeError::SchemaLoad(_)
        ));
        assert!(matches!(
            Schema::load(DocumentSource::Value(json!({ "type": "nonsense" }))).unwrap_err(),
            ForgeError::SchemaLoad(_)
        ));
    }

    #[test]
    fn test_custom_inline_schema() {
        let schema = Schema::load(
            r#"{ "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }"#,
        )
        .unwrap();
        let errors = schema.validate(&Descriptor::from_value(json!({})).unwrap());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, vec!["name"]);
    }

    #[test]
    fn test_nested_mapping_queries() {
        let schema = Schema::builtin().unwrap();
        assert_eq!(schema.enumerated("schema-version"), vec!["0.5"]);
        let input_types = schema
            .lookup("properties.inputs.items.properties.type.enum")
            .and_then(Value::as_array)
            .unwrap();
        assert!(input_types.contains(&json!("File")));
        assert!(schema.enumerated("name").is_empty());
    }

    #[test]
    fn test_split_pointer() {
        assert!(split_pointer("").is_empty());
        assert_eq!(split_pointer("/inputs/0/id"), vec!["inputs", "0", "id"]);
        assert_eq!(split_pointer("/a~1b/c~0d"), vec!["a/b", "c~d"]);
    }
}
