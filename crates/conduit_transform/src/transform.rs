//! Ordinary specified transforms.
//!
//! A [`TransformSpec`] pairs a function with the specifications its input
//! and output must satisfy. Applying it is the unprotected building block:
//! conformance failures and function errors are returned as
//! [`TransformError`], and panics propagate. Wrap it in a
//! [`NoThrowTransform`](crate::NoThrowTransform) to get failures as values.

use crate::error::TransformError;
use conduit_core::{
    ConversionError, NoThrowResult, NoThrowSpec, SpecRef, identity_no_throw_result,
};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Function name recorded for identity transforms
pub const IDENTITY_FN_NAME: &str = "identity_no_throw_result";

/// Signature shared by all transform functions
pub type TransformFn = dyn Fn(Value) -> anyhow::Result<Outcome> + Send + Sync;

/// Anything with declared input and output specifications
pub trait Transform {
    /// Specification accepted as input
    fn input_specification(&self) -> &SpecRef;

    /// Specification of the value produced on success
    fn output_specification(&self) -> &SpecRef;

    /// Short human-readable description of the applied function
    fn describe(&self) -> String;
}

/// Value returned by a transform function
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Plain record
    Value(Value),
    /// Result that already reports success or failure as a value
    Result(NoThrowResult<Value>),
}

impl Outcome {
    /// Payload, if any
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Result(r) => r.result(),
        }
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<NoThrowResult<Value>> for Outcome {
    fn from(result: NoThrowResult<Value>) -> Self {
        Self::Result(result)
    }
}

/// Basic transform: when applied to input conforming to `input`, returns
/// output conforming to `output`.
#[derive(Clone)]
pub struct TransformSpec {
    input: SpecRef,
    output: SpecRef,
    fn_name: String,
    func: Arc<TransformFn>,
}

impl TransformSpec {
    /// Create a transform from a function and its declared specifications
    pub fn new<F, O>(input: SpecRef, output: SpecRef, fn_name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<O> + Send + Sync + 'static,
        O: Into<Outcome>,
    {
        Self {
            input,
            output,
            fn_name: fn_name.into(),
            func: Arc::new(move |value: Value| -> anyhow::Result<Outcome> {
                func(value).map(Into::into)
            }),
        }
    }

    /// Transform that passes its input through as a successful no-throw result
    #[must_use]
    pub fn identity(spec: SpecRef) -> Self {
        let output = NoThrowSpec::wrap(spec.clone());
        Self::new(spec, output, IDENTITY_FN_NAME, |value| {
            Ok(identity_no_throw_result(value))
        })
    }

    /// Name of the wrapped function
    #[must_use]
    pub fn fn_name(&self) -> &str {
        &self.fn_name
    }

    /// Apply the transform.
    ///
    /// # Errors
    ///
    /// Returns error if the input does not conform to the input
    /// specification, the function fails, or its output does not conform to
    /// the output specification. Panics in the function are not caught.
    pub fn apply(&self, input: Value) -> Result<Outcome, TransformError> {
        let input = self.conform_input(input)?;
        let produced = self.call(input).map_err(TransformError::Fault)?;
        self.conform_output(produced)
    }

    pub(crate) fn conform_input(&self, input: Value) -> Result<Value, TransformError> {
        self.input
            .convert(input)
            .map_err(|source| TransformError::InputConformance {
                spec: self.input.name().to_string(),
                source,
            })
    }

    pub(crate) fn call(&self, input: Value) -> anyhow::Result<Outcome> {
        (self.func)(input)
    }

    pub(crate) fn conform_output(&self, produced: Outcome) -> Result<Outcome, TransformError> {
        let output_error = |source: ConversionError| TransformError::OutputConformance {
            spec: self.output.name().to_string(),
            source,
        };

        match (produced, self.output.no_throw_inner()) {
            (Outcome::Value(value), None) => self
                .output
                .convert(value)
                .map(Outcome::Value)
                .map_err(output_error),
            (Outcome::Value(value), Some(payload)) => payload
                .convert(value)
                .map(|v| Outcome::Result(NoThrowResult::success(v)))
                .map_err(output_error),
            (Outcome::Result(_), None) => Err(output_error(ConversionError::UnexpectedResult {
                spec: self.output.name().to_string(),
            })),
            (Outcome::Result(result), Some(payload)) => {
                if !result.succeeded() {
                    return Ok(Outcome::Result(result));
                }
                let (value, _, warnings) = result.into_parts();
                let value = value.unwrap_or(Value::Null);
                payload
                    .convert(value)
                    .map(|v| Outcome::Result(NoThrowResult::success_with_warnings(v, warnings)))
                    .map_err(output_error)
            }
        }
    }
}

impl Transform for TransformSpec {
    fn input_specification(&self) -> &SpecRef {
        &self.input
    }

    fn output_specification(&self) -> &SpecRef {
        &self.output
    }

    fn describe(&self) -> String {
        format!("`{}`", self.fn_name)
    }
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformSpec")
            .field("input", &self.input.name())
            .field("output", &self.output.name())
            .field("fn_name", &self.fn_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => {}: {}",
            self.input.name(),
            self.output.name(),
            self.describe()
        )
    }
}

/// Message carried by a caught panic
#[must_use]
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "transform panicked".to_string()
    }
}
