//! Field-mapping documents: which source field feeds which canonical field,
//! how it is typed, and which named transformation runs on it.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::MappingError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingDocument {
    pub mappings: Mappings,
    pub transformations: BTreeMap<String, Transformation>,
    /// Canonical field → value used when a required source field is absent.
    pub defaults: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mappings {
    /// Canonical field name → rule.
    pub product: BTreeMap<String, FieldRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub siesa_field: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Regex the converted string must match from its first character.
    #[serde(default)]
    pub validation: Option<String>,
    /// Name of an entry in [`MappingDocument::transformations`].
    #[serde(default)]
    pub transformation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    /// Any other declared type; the value passes through unconverted.
    #[serde(other)]
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    /// Date reformatting. Only `YYYY-MM-DD` → `ISO8601` changes the value.
    Format { from: String, to: String },
    /// Arithmetic over `value`, run by the sandboxed evaluator.
    Calculation { logic: String },
    /// Table keyed by the value's string form; misses keep the value.
    Lookup {
        #[serde(default)]
        table: BTreeMap<String, Value>,
    },
    Conditional {
        condition: String,
        #[serde(default)]
        true_value: Value,
        #[serde(default)]
        false_value: Value,
    },
}

impl MappingDocument {
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, MappingError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_yaml_reader<R: Read>(reader: R) -> Result<Self, MappingError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Loads `.json`, `.yaml` or `.yml` by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "json" => Self::from_json_reader(File::open(path)?),
            "yaml" | "yml" => Self::from_yaml_reader(File::open(path)?),
            _ => Err(MappingError::UnsupportedFormat { extension }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_document_parses_every_transformation_kind() {
        let document: MappingDocument = serde_json::from_value(json!({
            "mappings": { "product": {
                "id": { "siesa_field": "f_codigo", "required": true },
                "price": { "siesa_field": "f_precio", "type": "float", "transformation": "with_tax" },
                "weight": { "siesa_field": "f_peso", "type": "decimal" },
            }},
            "transformations": {
                "with_tax": { "type": "calculation", "logic": "value * 1.19" },
                "status": { "type": "lookup", "table": { "A": "active" } },
                "iso_date": { "type": "format", "from": "YYYY-MM-DD", "to": "ISO8601" },
                "flag": { "type": "conditional", "condition": "value > 0", "true_value": "yes" },
            },
            "defaults": { "stock_quantity": 0 },
        }))
        .expect("document parses");

        let id = &document.mappings.product["id"];
        assert_eq!(id.field_type, FieldType::String);
        assert!(id.required);
        assert_eq!(document.mappings.product["weight"].field_type, FieldType::Passthrough);
        assert_eq!(
            document.transformations["flag"],
            Transformation::Conditional {
                condition: "value > 0".into(),
                true_value: json!("yes"),
                false_value: Value::Null,
            }
        );
        assert_eq!(document.defaults["stock_quantity"], json!(0));
    }

    #[test]
    fn unknown_transformation_type_is_a_parse_error() {
        let result: Result<Transformation, _> =
            serde_json::from_value(json!({ "type": "script", "body": "rm -rf" }));
        assert!(result.is_err());
    }

    #[test]
    fn yaml_and_empty_documents_parse() {
        let document = MappingDocument::from_yaml_reader(
            "mappings:\n  product:\n    name:\n      siesa_field: f_nombre\n".as_bytes(),
        )
        .expect("yaml parses");
        assert_eq!(document.mappings.product["name"].siesa_field, "f_nombre");
        assert_eq!(
            MappingDocument::from_json_reader("{}".as_bytes()).expect("empty parses"),
            MappingDocument::default()
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = MappingDocument::from_file("mapping.ini").expect_err("ini unsupported");
        assert!(matches!(err, MappingError::UnsupportedFormat { extension } if extension == "ini"));
    }
}
