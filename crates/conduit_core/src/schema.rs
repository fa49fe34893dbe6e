//! Record schemas: named specifications with typed fields.

use crate::error::ConversionError;
use crate::spec::{FieldType, SpecRef, Specification, json_type_name};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A record specification with named, typed fields
///
/// Conversion keeps declared fields only. Fields
/// missing from the input are accepted only when declared
/// [`FieldType::Optional`] or [`FieldType::Any`], and become null.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: String,
    fields: IndexMap<String, FieldType>,
}

impl RecordSchema {
    /// Create a schema with no fields
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Declare a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Finish the schema as a shared specification
    #[must_use]
    pub fn build(self) -> SpecRef {
        Arc::new(self)
    }

    /// Declared type of a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    /// Number of declared fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema declares no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Specification for RecordSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_types(&self) -> IndexMap<String, FieldType> {
        self.fields.clone()
    }

    fn convert(&self, value: Value) -> Result<Value, ConversionError> {
        let mut input = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConversionError::NotARecord {
                    actual: json_type_name(&other).to_string(),
                });
            }
        };

        let mut record = Map::new();
        for (name, ty) in &self.fields {
            let converted = match input.remove(name) {
                Some(value) => ty.check(name, value)?,
                None if matches!(ty, FieldType::Optional(_) | FieldType::Any) => Value::Null,
                None => {
                    return Err(ConversionError::MissingField {
                        field: name.clone(),
                    });
                }
            };
            record.insert(name.clone(), converted);
        }

        Ok(Value::Object(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one_var() -> RecordSchema {
        RecordSchema::new("ExampleOneVarSchemaV1").with_field("var", FieldType::String)
    }

    #[test]
    fn test_schema_builder() {
        let schema = one_var().with_field("count", FieldType::Integer);
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.field("count"), Some(&FieldType::Integer));
        assert!(schema.field("missing").is_none());
        assert!(RecordSchema::new("Empty").is_empty());
    }

    #[test]
    fn test_convert_identity_on_conforming_record() {
        let value = json!({"var": "hello"});
        assert_eq!(one_var().convert(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_convert_drops_undeclared_fields() {
        let value = json!({"var": "hello", "extra": 1});
        assert_eq!(one_var().convert(value).unwrap(), json!({"var": "hello"}));
    }

    #[test]
    fn test_convert_missing_field() {
        let err = one_var()
            .convert(json!({"var1": "wrong", "var2": "input schema"}))
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::MissingField {
                field: "var".to_string()
            }
        );
    }

    #[test]
    fn test_convert_rejects_non_record() {
        let err = one_var().convert(json!("var")).unwrap_err();
        assert!(matches!(err, ConversionError::NotARecord { .. }));
    }

    #[test]
    fn test_convert_optional_field_defaults_to_null() {
        let schema = one_var().with_field("note", FieldType::Optional(Box::new(FieldType::String)));
        assert_eq!(
            schema.convert(json!({"var": "x"})).unwrap(),
            json!({"var": "x", "note": null})
        );
    }

    #[test]
    fn test_convert_nested_record_error_path() {
        let outer = RecordSchema::new("Outer").with_field("inner", FieldType::Record(one_var().build()));
        let err = outer.convert(json!({"inner": {"var": 3}})).unwrap_err();
        assert!(matches!(err, ConversionError::TypeMismatch { ref field, .. } if field == "inner.var"));
    }
}
