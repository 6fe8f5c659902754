//! The capability every feature module implements.

use crate::descriptor::{ModuleDescriptor, ModuleManifest};
use serde_json::Value;
use thiserror::Error;

/// Rejection of a module's input by its data schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("input must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' must be of type {expected}")]
    WrongType { field: String, expected: String },
}

/// A pluggable feature unit.
///
/// Modules are contributed by sources as constructed values; the registry
/// never resolves types from strings.
pub trait FeatureModule: Send + Sync {
    /// Identity and contract of this module.
    fn descriptor(&self) -> ModuleDescriptor;

    /// Validates input against the module's data schema.
    fn validate_input(&self, input: &Value) -> Result<(), InputError> {
        match self.descriptor().data_schema {
            Some(schema) => validate_against_schema(&schema, input),
            None => Ok(()),
        }
    }
}

/// Checks `input` against a schema mapping of field → rule.
///
/// A rule is either a type name (`"string"`, `"number"`, `"integer"`,
/// `"boolean"`, `"array"`, `"object"`, `"any"`) or a table
/// `{ type = "...", required = true }`. Fields are optional unless marked
/// required; unknown type names accept any value.
pub fn validate_against_schema(schema: &Value, input: &Value) -> Result<(), InputError> {
    let Some(rules) = schema.as_object() else {
        return Ok(());
    };
    let fields = input.as_object().ok_or(InputError::NotAnObject)?;

    for (field, rule) in rules {
        let (type_name, required) = match rule {
            Value::String(t) => (t.as_str(), false),
            Value::Object(def) => (
                def.get("type").and_then(Value::as_str).unwrap_or("any"),
                def.get("required").and_then(Value::as_bool).unwrap_or(false),
            ),
            _ => ("any", false),
        };

        match fields.get(field) {
            None | Some(Value::Null) if required => {
                return Err(InputError::MissingField(field.clone()));
            }
            None | Some(Value::Null) => {}
            Some(value) if !matches_type(type_name, value) => {
                return Err(InputError::WrongType {
                    field: field.clone(),
                    expected: type_name.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn matches_type(type_name: &str, value: &Value) -> bool {
    match type_name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" | "bool" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// A purely declarative module built from a manifest.
#[derive(Debug, Clone)]
pub struct ManifestModule {
    descriptor: ModuleDescriptor,
    settings: Option<Value>,
}

impl ManifestModule {
    #[must_use]
    pub fn from_manifest(manifest: &ModuleManifest) -> Self {
        Self {
            descriptor: manifest.descriptor(),
            settings: manifest.settings.clone(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> Option<&Value> {
        self.settings.as_ref()
    }
}

impl FeatureModule for ManifestModule {
    fn descriptor(&self) -> ModuleDescriptor {
        self.descriptor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "title": {"type": "string", "required": true},
            "duration": "integer",
            "tags": {"type": "array"},
            "notes": "whatever",
        })
    }

    #[test]
    fn accepts_matching_input() {
        let input = json!({"title": "Ep 1", "duration": 320, "tags": ["a"]});
        assert_eq!(validate_against_schema(&schema(), &input), Ok(()));
    }

    #[test]
    fn required_field_missing_or_null() {
        assert_eq!(
            validate_against_schema(&schema(), &json!({"duration": 1})),
            Err(InputError::MissingField("title".into()))
        );
        assert_eq!(
            validate_against_schema(&schema(), &json!({"title": null})),
            Err(InputError::MissingField("title".into()))
        );
    }

    #[test]
    fn wrong_type_rejected() {
        let err = validate_against_schema(&schema(), &json!({"title": "x", "duration": 1.5}))
            .unwrap_err();
        assert_eq!(
            err,
            InputError::WrongType {
                field: "duration".into(),
                expected: "integer".into()
            }
        );
    }

    #[test]
    fn unknown_type_accepts_anything() {
        let input = json!({"title": "x", "notes": {"deep": [1, 2]}});
        assert_eq!(validate_against_schema(&schema(), &input), Ok(()));
    }

    #[test]
    fn non_object_input_rejected() {
        assert_eq!(
            validate_against_schema(&schema(), &json!([1, 2])),
            Err(InputError::NotAnObject)
        );
    }

    #[test]
    fn manifest_module_uses_schema() {
        let manifest = ModuleManifest::parse(
            r#"
id = "notes"
name = "Notes"
description = "Plain notes"
version = "1.0.0"

[data_schema]
body = { type = "string", required = true }

[settings]
max_length = 2000
"#,
        )
        .unwrap();
        let module = ManifestModule::from_manifest(&manifest);
        assert_eq!(module.settings().unwrap()["max_length"], 2000);
        assert!(module.validate_input(&json!({"body": "hi"})).is_ok());
        assert!(module.validate_input(&json!({})).is_err());
    }
}
