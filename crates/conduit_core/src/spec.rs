//! Specification capability.
//!
//! A specification describes the shape of the records a transform accepts
//! or produces. Every pipeline component is written against the
//! [`Specification`] trait rather than a particular schema system;
//! [`RecordSchema`](crate::RecordSchema) is the implementation shipped with
//! this crate.

use crate::error::ConversionError;
use crate::result::NoThrowResult;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a specification
pub type SpecRef = Arc<dyn Specification>;

/// Field name to resolved field entry, in declaration order
pub type FieldDict = IndexMap<String, FieldEntry>;

/// Abstract data shape with named, typed fields
pub trait Specification: fmt::Debug + Send + Sync {
    /// Display name of the specification
    fn name(&self) -> &str;

    /// Declared fields and their types, in declaration order
    fn field_types(&self) -> IndexMap<String, FieldType>;

    /// Interpret `value` as this specification.
    ///
    /// Must be the identity for values that already conform.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be coerced
    fn convert(&self, value: Value) -> Result<Value, ConversionError>;

    /// Field name to field type mapping, resolving nested records.
    ///
    /// Record-typed fields (and no-throw results wrapping records) resolve to
    /// the nested record's own mapping. Override to recurse into custom
    /// nested types; self-referential shapes will overflow the stack.
    fn field_dict(&self) -> FieldDict {
        self.field_types()
            .into_iter()
            .map(|(name, ty)| (name, ty.entry()))
            .collect()
    }

    /// Payload specification, if this is a no-throw result specification
    fn no_throw_inner(&self) -> Option<&SpecRef> {
        None
    }

    /// Placeholder record whose fields hold type-appropriate empty values
    fn sample(&self) -> Value {
        sample_record(&self.field_dict())
    }
}

/// Semantic type of one field
#[derive(Debug, Clone)]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Signed integer
    Integer,
    /// Floating point number; integers are widened
    Float,
    /// Boolean
    Bool,
    /// Any value, including null
    Any,
    /// Nullable value
    Optional(Box<FieldType>),
    /// Homogeneous list
    List(Box<FieldType>),
    /// Nested record
    Record(SpecRef),
    /// Serialized no-throw result wrapping a value of the inner type
    NoThrow(Box<FieldType>),
}

impl FieldType {
    /// Coerce a field value into this type
    ///
    /// # Errors
    ///
    /// Returns error naming `field` if the value does not fit
    pub fn check(&self, field: &str, value: Value) -> Result<Value, ConversionError> {
        let mismatch = |value: &Value| ConversionError::TypeMismatch {
            field: field.to_string(),
            expected: self.to_string(),
            actual: json_type_name(value).to_string(),
        };

        match self {
            Self::Any => Ok(value),
            Self::String if value.is_string() => Ok(value),
            Self::Integer if value.is_i64() || value.is_u64() => Ok(value),
            Self::Float => match value.as_f64() {
                Some(n) => serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .ok_or_else(|| mismatch(&value)),
                None => Err(mismatch(&value)),
            },
            Self::Bool if value.is_boolean() => Ok(value),
            Self::Optional(_) if value.is_null() => Ok(Value::Null),
            Self::Optional(inner) => inner.check(field, value),
            Self::List(inner) => match value {
                Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| inner.check(&format!("{field}[{i}]"), item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(mismatch(&other)),
            },
            Self::Record(spec) => spec.convert(value).map_err(|e| e.within(field)),
            Self::NoThrow(inner) => {
                let result: NoThrowResult<Value> = serde_json::from_value(value).map_err(|e| {
                    ConversionError::InvalidResult {
                        field: field.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                let (payload, violations, warnings) = result.into_parts();
                let payload = payload.map(|p| inner.check(field, p)).transpose()?;
                let checked = NoThrowResult::new(payload, violations, warnings).map_err(|e| {
                    ConversionError::InvalidResult {
                        field: field.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                serde_json::to_value(checked).map_err(|e| ConversionError::InvalidResult {
                    field: field.to_string(),
                    reason: e.to_string(),
                })
            }
            _ => Err(mismatch(&value)),
        }
    }

    /// Resolve this type for field introspection
    #[must_use]
    pub fn entry(&self) -> FieldEntry {
        match self {
            Self::Record(spec) => FieldEntry::Nested {
                type_name: spec.name().to_string(),
                fields: spec.field_dict(),
            },
            Self::NoThrow(inner) => inner.entry(),
            other => FieldEntry::Leaf(other.clone()),
        }
    }

    /// Placeholder value of this type
    #[must_use]
    pub fn sample(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Integer => Value::from(0),
            Self::Float => Value::from(0.0),
            Self::Bool => Value::Bool(false),
            Self::Any | Self::Optional(_) => Value::Null,
            Self::List(_) => Value::Array(Vec::new()),
            Self::Record(spec) => spec.sample(),
            Self::NoThrow(inner) => inner.sample(),
        }
    }
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String, Self::String)
            | (Self::Integer, Self::Integer)
            | (Self::Float, Self::Float)
            | (Self::Bool, Self::Bool)
            | (Self::Any, Self::Any) => true,
            (Self::Optional(a), Self::Optional(b))
            | (Self::List(a), Self::List(b))
            | (Self::NoThrow(a), Self::NoThrow(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => {
                Arc::ptr_eq(a, b) || (a.name() == b.name() && a.field_dict() == b.field_dict())
            }
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "String"),
            Self::Integer => write!(f, "Integer"),
            Self::Float => write!(f, "Float"),
            Self::Bool => write!(f, "Bool"),
            Self::Any => write!(f, "Any"),
            Self::Optional(inner) => write!(f, "Optional<{}>", inner),
            Self::List(inner) => write!(f, "List<{}>", inner),
            Self::Record(spec) => write!(f, "{}", spec.name()),
            Self::NoThrow(inner) => write!(f, "NoThrowResult<{}>", inner),
        }
    }
}

/// Resolved field, as reported by [`Specification::field_dict`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEntry {
    /// Scalar or container type
    Leaf(FieldType),
    /// Nested record, resolved to its own mapping
    Nested {
        /// Name of the nested specification
        type_name: String,
        /// Fields of the nested specification
        fields: FieldDict,
    },
}

impl fmt::Display for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(ty) => write!(f, "{}", ty),
            Self::Nested { type_name, .. } => write!(f, "{}", type_name),
        }
    }
}

/// Specification of a no-throw result whose payload follows `inner`
#[derive(Debug, Clone)]
pub struct NoThrowSpec {
    name: String,
    inner: SpecRef,
}

impl NoThrowSpec {
    /// Wrap a specification, collapsing if it is already a no-throw result
    #[must_use]
    pub fn wrap(spec: SpecRef) -> SpecRef {
        if spec.no_throw_inner().is_some() {
            return spec;
        }
        Arc::new(Self {
            name: format!("NoThrowResult<{}>", spec.name()),
            inner: spec,
        })
    }

    /// Payload specification
    #[must_use]
    pub fn inner(&self) -> &SpecRef {
        &self.inner
    }
}

impl Specification for NoThrowSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_types(&self) -> IndexMap<String, FieldType> {
        self.inner.field_types()
    }

    fn convert(&self, value: Value) -> Result<Value, ConversionError> {
        self.inner.convert(value)
    }

    fn field_dict(&self) -> FieldDict {
        self.inner.field_dict()
    }

    fn no_throw_inner(&self) -> Option<&SpecRef> {
        Some(&self.inner)
    }

    fn sample(&self) -> Value {
        self.inner.sample()
    }
}

/// Payload specification of `spec`, unwrapping one no-throw layer
#[must_use]
pub fn unwrap_no_throw(spec: &SpecRef) -> &SpecRef {
    spec.no_throw_inner().unwrap_or(spec)
}

/// Check whether every field of `target` exists in `source` with the same type
#[must_use]
pub fn is_compatible(source: &dyn Specification, target: &dyn Specification) -> bool {
    let available = source.field_dict();
    target
        .field_dict()
        .iter()
        .all(|(name, entry)| available.get(name) == Some(entry))
}

/// Check whether two specifications describe the same shape
#[must_use]
pub fn same_shape(a: &dyn Specification, b: &dyn Specification) -> bool {
    a.name() == b.name() && a.field_dict() == b.field_dict()
}

/// Placeholder record built from a resolved field mapping
#[must_use]
pub fn sample_record(fields: &FieldDict) -> Value {
    let record = fields
        .iter()
        .map(|(name, entry)| {
            let value = match entry {
                FieldEntry::Leaf(ty) => ty.sample(),
                FieldEntry::Nested { fields, .. } => sample_record(fields),
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(record)
}

/// JSON type name used in conversion messages
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordSchema;
    use serde_json::json;

    fn person() -> SpecRef {
        RecordSchema::new("PersonV1")
            .with_field("name", FieldType::String)
            .with_field("age", FieldType::Integer)
            .build()
    }

    #[test]
    fn test_field_check_scalars() {
        assert_eq!(FieldType::String.check("s", json!("x")).unwrap(), json!("x"));
        assert_eq!(FieldType::Integer.check("i", json!(3)).unwrap(), json!(3));
        assert_eq!(FieldType::Float.check("f", json!(3)).unwrap(), json!(3.0));
        assert!(FieldType::Bool.check("b", json!("true")).is_err());
        assert_eq!(FieldType::Any.check("a", Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_field_check_list_reports_index() {
        let ty = FieldType::List(Box::new(FieldType::Integer));
        let err = ty.check("xs", json!([1, "two"])).unwrap_err();
        assert!(matches!(err, ConversionError::TypeMismatch { ref field, .. } if field == "xs[1]"));
    }

    #[test]
    fn test_field_check_optional() {
        let ty = FieldType::Optional(Box::new(FieldType::String));
        assert_eq!(ty.check("o", Value::Null).unwrap(), Value::Null);
        assert!(ty.check("o", json!(1)).is_err());
    }

    #[test]
    fn test_field_check_no_throw() {
        let ty = FieldType::NoThrow(Box::new(FieldType::String));
        let ok = json!({"result": "yes", "violations": [], "warnings": []});
        assert_eq!(ty.check("r", ok.clone()).unwrap(), ok);

        let bad_payload = json!({"result": 1, "violations": [], "warnings": []});
        assert!(ty.check("r", bad_payload).is_err());

        let both = json!({"result": "yes", "violations": ["no"], "warnings": []});
        assert!(matches!(
            ty.check("r", both),
            Err(ConversionError::InvalidResult { .. })
        ));
    }

    #[test]
    fn test_field_check_no_throw_null_payload() {
        let null_ok = json!({"result": null, "violations": [], "warnings": []});
        let optional = FieldType::NoThrow(Box::new(FieldType::Optional(Box::new(FieldType::String))));
        assert_eq!(optional.check("r", null_ok.clone()).unwrap(), null_ok);
        let any = FieldType::NoThrow(Box::new(FieldType::Any));
        assert_eq!(any.check("r", null_ok.clone()).unwrap(), null_ok);

        let required = FieldType::NoThrow(Box::new(FieldType::String));
        assert!(required.check("r", null_ok).is_err());
    }

    #[test]
    fn test_field_dict_resolves_nested_records() {
        let team = RecordSchema::new("TeamV1")
            .with_field("lead", FieldType::Record(person()))
            .with_field(
                "backup",
                FieldType::NoThrow(Box::new(FieldType::Record(person()))),
            )
            .build();

        let dict = team.field_dict();
        for key in ["lead", "backup"] {
            match &dict[key] {
                FieldEntry::Nested { type_name, fields } => {
                    assert_eq!(type_name, "PersonV1");
                    assert!(fields.contains_key("name"));
                    assert!(fields.contains_key("age"));
                }
                other => panic!("expected nested entry, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_throw_spec_wrap_collapses() {
        let wrapped = NoThrowSpec::wrap(person());
        assert_eq!(wrapped.name(), "NoThrowResult<PersonV1>");

        let rewrapped = NoThrowSpec::wrap(wrapped.clone());
        assert!(Arc::ptr_eq(&wrapped, &rewrapped));
        assert_eq!(unwrap_no_throw(&rewrapped).name(), "PersonV1");
    }

    #[test]
    fn test_no_throw_spec_field_dict_unwraps() {
        let wrapped = NoThrowSpec::wrap(person());
        assert_eq!(wrapped.field_dict(), person().field_dict());
    }

    #[test]
    fn test_is_compatible() {
        let name_only = RecordSchema::new("NameV1")
            .with_field("name", FieldType::String)
            .build();
        assert!(is_compatible(person().as_ref(), name_only.as_ref()));
        assert!(!is_compatible(name_only.as_ref(), person().as_ref()));
    }

    #[test]
    fn test_sample_record() {
        assert_eq!(person().sample(), json!({"name": "", "age": 0}));
    }
}
