//! Pipeline executor.
//!
//! Walks a [`Pipeline`] in step order. Each step's input is the pipeline
//! input (first step) or the output of its assembler, converted to the
//! step's input specification. The first failure ends the run; steps after
//! it never execute.

use crate::error::ExecutionError;
use conduit_core::{NoThrowResult, RunId};
use conduit_plan::{Pipeline, StepRef, StepTransform};
use conduit_transform::{Outcome, StepOutput, Transform, Upstream, panic_message};
use indexmap::IndexMap;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, info, info_span, trace, warn};

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Turn panics in assemblers and plain transforms into failures
    pub catch_panics: bool,
    /// Log every step output at trace level
    pub trace_outputs: bool,
}

impl ExecutorConfig {
    /// Enable or disable panic catching
    #[must_use]
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Enable or disable output tracing
    #[must_use]
    pub fn with_trace_outputs(mut self, trace: bool) -> Self {
        self.trace_outputs = trace;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            trace_outputs: false,
        }
    }
}

/// Runs pipelines
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a pipeline, reporting any failure as a value.
    ///
    /// On success the result holds the last step's output and the warnings
    /// of every step, in step order. On failure it names the first failing
    /// step; a failed no-throw step's own result is returned as is, after
    /// the warnings of the steps before it.
    pub fn execute(&self, pipeline: &Pipeline, input: Value) -> NoThrowResult<Value> {
        let run_id = RunId::new();
        let span = info_span!("pipeline_run", %run_id, steps = pipeline.len());
        let _guard = span.enter();

        let mut outputs: IndexMap<String, StepOutput> = IndexMap::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut pipeline_input = Some(input);

        for step in pipeline.steps() {
            debug!(step = %step.name, "running step");

            let step_input = match self.step_input(step, &outputs, &mut pipeline_input) {
                Ok(value) => value,
                Err(details) => {
                    let message = input_failure(step, &details);
                    warn!(step = %step.name, %details, "step input rejected");
                    return NoThrowResult::violation(message).with_earlier_warnings(&warnings);
                }
            };

            let output = match self.apply(step, step_input) {
                Ok(output) => output,
                Err(result) => {
                    warn!(step = %step.name, violations = ?result.violations(), "step failed");
                    return result.with_earlier_warnings(&warnings);
                }
            };

            if self.config.trace_outputs {
                trace!(step = %step.name, output = ?output, "step output");
            }
            warnings.extend(output.warnings().iter().cloned());
            outputs.insert(step.name.to_string(), output);
        }

        match outputs.pop().and_then(|(_, output)| output.into_value()) {
            Some(value) => {
                info!(warnings = warnings.len(), "pipeline succeeded");
                NoThrowResult::success_with_warnings(value, warnings)
            }
            None => NoThrowResult::violation("pipeline produced no output"),
        }
    }

    /// Execute a pipeline without converting failures to values.
    ///
    /// Debugging aid: no-throw steps run their wrapped transform directly,
    /// and panics propagate to the caller.
    ///
    /// # Errors
    ///
    /// Returns the first step failure
    pub fn execute_force_throw(
        &self,
        pipeline: &Pipeline,
        input: Value,
    ) -> Result<Value, ExecutionError> {
        let run_id = RunId::new();
        let span = info_span!("pipeline_run", %run_id, steps = pipeline.len(), force_throw = true);
        let _guard = span.enter();

        let mut outputs: IndexMap<String, StepOutput> = IndexMap::new();
        let mut pipeline_input = Some(input);

        for step in pipeline.steps() {
            let spec = step.transform.input_specification();
            let step_input = match step.assembler {
                None => pipeline_input.take().unwrap_or(Value::Null),
                Some(assembler) => assembler
                    .assemble(&Upstream::live(&outputs))
                    .map_err(|err| ExecutionError::InvalidStepInput {
                        step: step.name.to_string(),
                        spec: spec.name().to_string(),
                        details: format!("{err:#}"),
                    })?,
            };
            let step_input = spec
                .convert(step_input)
                .map_err(|err| ExecutionError::InvalidStepInput {
                    step: step.name.to_string(),
                    spec: spec.name().to_string(),
                    details: err.to_string(),
                })?;

            let outcome = match step.transform {
                StepTransform::Plain(t) => t.apply(step_input),
                StepTransform::NoThrow(t) => t.apply_force_throw(step_input),
            }
            .map_err(|source| ExecutionError::StepFailed {
                step: step.name.to_string(),
                source,
            })?;

            let output = match outcome {
                Outcome::Value(value) => StepOutput::Plain(value),
                Outcome::Result(result) if !result.succeeded() => {
                    return Err(ExecutionError::StepReturnedFailure {
                        step: step.name.to_string(),
                        violations: result.violations().to_vec(),
                    });
                }
                Outcome::Result(result) => StepOutput::NoThrow(result),
            };
            if self.config.trace_outputs {
                trace!(step = %step.name, output = ?output, "step output");
            }
            outputs.insert(step.name.to_string(), output);
        }

        Ok(outputs
            .pop()
            .and_then(|(_, output)| output.into_value())
            .unwrap_or(Value::Null))
    }

    fn step_input(
        &self,
        step: StepRef<'_>,
        outputs: &IndexMap<String, StepOutput>,
        pipeline_input: &mut Option<Value>,
    ) -> Result<Value, String> {
        let raw = match step.assembler {
            None => pipeline_input.take().unwrap_or(Value::Null),
            Some(assembler) => {
                let upstream = Upstream::live(outputs);
                self.guard(|| assembler.assemble(&upstream).map_err(|err| format!("{err:#}")))?
            }
        };
        step.transform
            .input_specification()
            .convert(raw)
            .map_err(|err| err.to_string())
    }

    fn apply(&self, step: StepRef<'_>, input: Value) -> Result<StepOutput, NoThrowResult<Value>> {
        match step.transform {
            StepTransform::NoThrow(t) => {
                let result = t.apply(input);
                if result.succeeded() {
                    Ok(StepOutput::NoThrow(result))
                } else {
                    Err(result)
                }
            }
            StepTransform::Plain(t) => {
                let outcome = self
                    .guard(|| t.apply(input).map_err(|err| err.to_string()))
                    .map_err(|cause| {
                        NoThrowResult::violation(format!("Step `{}` failed: {}", step.name, cause))
                    })?;
                match outcome {
                    Outcome::Value(value) => Ok(StepOutput::Plain(value)),
                    Outcome::Result(result) if result.succeeded() => {
                        Ok(StepOutput::NoThrow(result))
                    }
                    Outcome::Result(result) => Err(result),
                }
            }
        }
    }

    fn guard<T>(&self, f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
        if !self.config.catch_panics {
            return f();
        }
        catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(panic_message(payload)))
    }
}

fn input_failure(step: StepRef<'_>, details: &str) -> String {
    format!(
        "Input to step `{}` doesn't conform to specification `{}`. Details: {}",
        step.name,
        step.transform.input_specification().name(),
        details
    )
}

/// Execute a pipeline with the default executor
pub fn execute(pipeline: &Pipeline, input: Value) -> NoThrowResult<Value> {
    Executor::default().execute(pipeline, input)
}

/// Execute a pipeline with the default executor, letting failures propagate
///
/// # Errors
///
/// Returns the first step failure
pub fn execute_force_throw(pipeline: &Pipeline, input: Value) -> Result<Value, ExecutionError> {
    Executor::default().execute_force_throw(pipeline, input)
}
