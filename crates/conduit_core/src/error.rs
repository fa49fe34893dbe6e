//! Core error types for Conduit.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A failed result was constructed without any violations
    #[error("a failed result requires at least one violation")]
    EmptyViolations,

    /// Result fields contradict each other
    #[error("invalid result: {reason}")]
    InvalidResult {
        /// Why the combination was rejected
        reason: String,
    },

    /// Value could not be interpreted as a specification
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Failure to interpret a value as a given specification.
///
/// Field paths are dotted (`outer.inner`) when the offending field sits
/// inside a nested record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// Value is not a record
    #[error("expected a record, got a value of type {actual}")]
    NotARecord {
        /// JSON type of the offending value
        actual: String,
    },

    /// Required field is absent
    #[error("missing required field `{field}`")]
    MissingField {
        /// Field path
        field: String,
    },

    /// Field holds a value of the wrong type
    #[error("invalid value set for field `{field}`, expected {expected}, got a value of type {actual}")]
    TypeMismatch {
        /// Field path
        field: String,
        /// Declared type
        expected: String,
        /// JSON type of the offending value
        actual: String,
    },

    /// A no-throw result was produced where a plain value is declared
    #[error("specification `{spec}` is not a no-throw result, but a no-throw result was produced")]
    UnexpectedResult {
        /// Declared specification name
        spec: String,
    },

    /// Serialized no-throw result could not be read back
    #[error("field `{field}` does not hold a valid no-throw result: {reason}")]
    InvalidResult {
        /// Field path
        field: String,
        /// Decoder message
        reason: String,
    },
}

impl ConversionError {
    /// Re-anchor the error under a parent field
    #[must_use]
    pub fn within(self, parent: &str) -> Self {
        let nest = |field: String| format!("{parent}.{field}");
        match self {
            Self::MissingField { field } => Self::MissingField { field: nest(field) },
            Self::TypeMismatch {
                field,
                expected,
                actual,
            } => Self::TypeMismatch {
                field: nest(field),
                expected,
                actual,
            },
            Self::InvalidResult { field, reason } => Self::InvalidResult {
                field: nest(field),
                reason,
            },
            Self::NotARecord { actual } => Self::TypeMismatch {
                field: parent.to_string(),
                expected: "record".to_string(),
                actual,
            },
            other @ Self::UnexpectedResult { .. } => other,
        }
    }
}
