//! Errors raised by ordinary transforms and input assemblers.

use conduit_core::ConversionError;

/// Failure of an ordinary (non-wrapped) transform
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Input does not conform to the declared input specification
    #[error("input does not conform to declared input specification `{spec}`: {source}")]
    InputConformance {
        /// Declared input specification
        spec: String,
        /// Conversion failure
        source: ConversionError,
    },

    /// The transform function returned an error
    #[error("{0:#}")]
    Fault(anyhow::Error),

    /// Output does not conform to the declared output specification
    #[error("output does not conform to declared output specification `{spec}`: {source}")]
    OutputConformance {
        /// Declared output specification
        spec: String,
        /// Conversion failure
        source: ConversionError,
    },
}

/// Failure to read an upstream output while assembling a step input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    /// No output recorded for the step
    #[error("no output available from step `{step}`")]
    UnknownStep {
        /// Requested step
        step: String,
    },

    /// Step output has no such field
    #[error("output of step `{step}` has no field `{field}`")]
    MissingField {
        /// Requested step
        step: String,
        /// Requested field
        field: String,
    },

    /// Field holds a value of an unexpected type
    #[error("field `{field}` of step `{step}` is not {expected}")]
    TypeMismatch {
        /// Requested step
        step: String,
        /// Requested field
        field: String,
        /// Expected JSON type
        expected: String,
    },
}
