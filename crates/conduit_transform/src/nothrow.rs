//! No-throw transforms.
//!
//! [`NoThrowTransform`] wraps a [`TransformSpec`] so that applying it always
//! returns a [`NoThrowResult`]: conformance failures, function errors and
//! panics all become violations. Results returned by the wrapped function
//! are collapsed into the adapter's own result rather than nested.

use crate::error::TransformError;
use crate::transform::{IDENTITY_FN_NAME, Outcome, Transform, TransformSpec, panic_message};
use conduit_core::{NoThrowResult, NoThrowSpec, SpecRef, same_shape, unwrap_no_throw};
use serde_json::Value;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// Transform whose application never fails by error or panic
#[derive(Debug, Clone)]
pub struct NoThrowTransform {
    transform: TransformSpec,
    output: SpecRef,
}

impl NoThrowTransform {
    /// Wrap an ordinary transform
    #[must_use]
    pub fn new(transform: TransformSpec) -> Self {
        let output = NoThrowSpec::wrap(transform.output_specification().clone());
        Self { transform, output }
    }

    /// Build the wrapped transform in place
    pub fn from_fn<F, O>(input: SpecRef, output: SpecRef, fn_name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<O> + Send + Sync + 'static,
        O: Into<Outcome>,
    {
        Self::new(TransformSpec::new(input, output, fn_name, func))
    }

    /// Identity no-throw transform over `spec`
    #[must_use]
    pub fn identity(spec: SpecRef) -> Self {
        Self::new(TransformSpec::identity(spec))
    }

    /// Check if this is an identity transform: output is the no-throw
    /// result of the input specification and the function passes its input
    /// through unchanged.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.transform.fn_name() == IDENTITY_FN_NAME
            && self.output.no_throw_inner().is_some()
            && same_shape(
                unwrap_no_throw(&self.output).as_ref(),
                self.input_specification().as_ref(),
            )
    }

    /// The wrapped ordinary transform
    #[must_use]
    pub fn inner(&self) -> &TransformSpec {
        &self.transform
    }

    /// Apply the transform, reporting every failure as a violation.
    ///
    /// Panics become violations too, but the panic hook still runs first;
    /// with the default hook the message also lands on stderr.
    pub fn apply(&self, input: Value) -> NoThrowResult<Value> {
        let input = match self.transform.conform_input(input) {
            Ok(input) => input,
            Err(err) => return NoThrowResult::violation(err.to_string()),
        };

        let produced = match catch_unwind(AssertUnwindSafe(|| self.transform.call(input))) {
            Ok(Ok(produced)) => produced,
            Ok(Err(err)) => {
                debug!(transform = %self.transform.fn_name(), error = %err, "transform returned an error");
                return NoThrowResult::violation(format!("{err:#}"));
            }
            Err(payload) => {
                let message = panic_message(payload);
                debug!(transform = %self.transform.fn_name(), panic = %message, "transform panicked");
                return NoThrowResult::violation(message);
            }
        };

        match produced {
            Outcome::Result(result) if !result.succeeded() => result.collapse(),
            Outcome::Result(result) => {
                let (value, _, warnings) = result.into_parts();
                self.conform_payload(value.unwrap_or(Value::Null))
                    .with_diagnostics(Vec::<String>::new(), warnings)
            }
            Outcome::Value(value) => self.conform_payload(value),
        }
    }

    /// Apply the wrapped transform directly, letting failures propagate.
    ///
    /// Debugging aid only: errors come back as [`TransformError`] and panics
    /// unwind through the caller, keeping the full call stack.
    ///
    /// # Errors
    ///
    /// Returns error whenever [`TransformSpec::apply`] does
    pub fn apply_force_throw(&self, input: Value) -> Result<Outcome, TransformError> {
        self.transform.apply(input)
    }

    fn conform_payload(&self, value: Value) -> NoThrowResult<Value> {
        let payload = unwrap_no_throw(&self.output);
        match payload.convert(value) {
            Ok(value) => NoThrowResult::success(value),
            Err(source) => NoThrowResult::violation(
                TransformError::OutputConformance {
                    spec: payload.name().to_string(),
                    source,
                }
                .to_string(),
            ),
        }
    }
}

impl Transform for NoThrowTransform {
    fn input_specification(&self) -> &SpecRef {
        self.transform.input_specification()
    }

    fn output_specification(&self) -> &SpecRef {
        &self.output
    }

    fn describe(&self) -> String {
        self.transform.describe()
    }
}

impl fmt::Display for NoThrowTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} => {}: {}",
            self.input_specification().name(),
            unwrap_no_throw(&self.output).name(),
            self.describe()
        )
    }
}
