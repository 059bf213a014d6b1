//! JSON Schema validation for AI responses, including `$ref` resolution
//! through a small in-process catalog (spec §4.8 step 9).

use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown schema id: {0}")]
    UnknownSchema(String),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("response failed schema validation: {0}")]
    Invalid(String),
}

/// Maps `$ref` ids (e.g. `"search_result"`) to their compiled JSON Schema
/// document. Prompts embed either an inline schema or a `$ref` into one of
/// these.
pub trait SchemaCatalog: Send + Sync {
    fn get(&self, id: &str) -> Option<&Value>;
}

#[derive(Default)]
pub struct StaticSchemaCatalog {
    schemas: HashMap<String, Value>,
}

impl StaticSchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, schema: Value) {
        self.schemas.insert(id.into(), schema);
    }
}

impl SchemaCatalog for StaticSchemaCatalog {
    fn get(&self, id: &str) -> Option<&Value> {
        self.schemas.get(id)
    }
}

/// Validates a decoded response value against either an inline schema or a
/// `$ref` resolved through `catalog`.
pub fn validate(schema_or_ref: &crate::ai::prompt::ResponseSchema, catalog: &dyn SchemaCatalog, value: &Value) -> Result<(), SchemaError> {
    let schema_doc = match schema_or_ref {
        crate::ai::prompt::ResponseSchema::Ref { reference } => {
            catalog.get(reference).ok_or_else(|| SchemaError::UnknownSchema(reference.clone()))?
        }
        crate::ai::prompt::ResponseSchema::Inline(schema) => schema,
    };

    let compiled = JSONSchema::compile(schema_doc).map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;
    let result = compiled.validate(value);
    if let Err(errors) = result {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(SchemaError::Invalid(messages.join("; ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::prompt::ResponseSchema;
    use serde_json::json;

    fn sample_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        })
    }

    #[test]
    fn inline_schema_accepts_matching_value() {
        let catalog = StaticSchemaCatalog::new();
        let schema = ResponseSchema::Inline(sample_schema());
        let value = json!({ "name": "ada" });
        assert!(validate(&schema, &catalog, &value).is_ok());
    }

    #[test]
    fn inline_schema_rejects_missing_required_field() {
        let catalog = StaticSchemaCatalog::new();
        let schema = ResponseSchema::Inline(sample_schema());
        let value = json!({});
        assert!(matches!(validate(&schema, &catalog, &value), Err(SchemaError::Invalid(_))));
    }

    #[test]
    fn ref_schema_resolves_through_catalog() {
        let mut catalog = StaticSchemaCatalog::new();
        catalog.insert("search_result", sample_schema());
        let schema = ResponseSchema::Ref { reference: "search_result".to_string() };
        let value = json!({ "name": "ada" });
        assert!(validate(&schema, &catalog, &value).is_ok());
    }

    #[test]
    fn unknown_ref_is_an_error() {
        let catalog = StaticSchemaCatalog::new();
        let schema = ResponseSchema::Ref { reference: "missing".to_string() };
        assert!(matches!(validate(&schema, &catalog, &json!({})), Err(SchemaError::UnknownSchema(_))));
    }
}
