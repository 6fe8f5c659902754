//! Module descriptors, manifests and the structural contract.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tiergate_types::Tier;

/// Identity and contract of a feature module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    /// Lowest tier the module is meant for. Informational only; access is
    /// decided by the tier's allowed-module set.
    #[serde(default)]
    pub min_tier: Tier,
    /// Field name → validation rule, used by the module on its own input.
    #[serde(default)]
    pub data_schema: Option<serde_json::Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ModuleDescriptor {
    /// Creates an enabled, free-tier descriptor with an empty schema.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            version: version.into(),
            min_tier: Tier::Free,
            data_schema: Some(serde_json::Value::Object(serde_json::Map::new())),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_min_tier(mut self, tier: Tier) -> Self {
        self.min_tier = tier;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.data_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// On-disk module manifest (`<name>.toml`).
///
/// Every descriptor field is optional at parse time so that a missing field
/// is reported by [`validate`] rather than as a TOML error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub min_tier: Tier,
    #[serde(default)]
    pub data_schema: Option<serde_json::Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Factory name. Defaults to the manifest's file stem.
    #[serde(default)]
    pub kind: Option<String>,
    /// Free-form settings handed to the factory.
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

impl ModuleManifest {
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    #[must_use]
    pub fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            min_tier: self.min_tier,
            data_schema: self.data_schema.clone(),
            enabled: self.enabled,
        }
    }
}

/// Returns true if `id` is non-empty and only uses `[a-z0-9_-]`.
#[must_use]
pub fn is_valid_module_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Checks a descriptor against the module contract.
///
/// Order: required fields, id pattern, schema shape. Stops at the first
/// failure.
pub fn validate(descriptor: &ModuleDescriptor) -> Result<(), ValidationError> {
    let required = [
        ("id", &descriptor.id),
        ("name", &descriptor.name),
        ("description", &descriptor.description),
        ("version", &descriptor.version),
    ];
    if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
        return Err(ValidationError::MissingField(*field));
    }

    if !is_valid_module_id(&descriptor.id) {
        return Err(ValidationError::InvalidId(descriptor.id.clone()));
    }

    match &descriptor.data_schema {
        None | Some(serde_json::Value::Null) => Err(ValidationError::MissingSchema),
        Some(serde_json::Value::Object(_)) => Ok(()),
        Some(other) => Err(ValidationError::SchemaNotMapping(json_kind(other))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
