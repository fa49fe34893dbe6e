//! Errors raised by force-throw execution.

use conduit_transform::TransformError;

/// Execution failure, raised only by
/// [`Executor::execute_force_throw`](crate::Executor::execute_force_throw)
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A step's input could not be built or does not conform
    #[error("Input to step `{step}` doesn't conform to specification `{spec}`. Details: {details}")]
    InvalidStepInput {
        /// Failing step
        step: String,
        /// Declared input specification of the step
        spec: String,
        /// Underlying cause
        details: String,
    },

    /// A step's transform raised an error
    #[error("Step `{step}` failed: {source}")]
    StepFailed {
        /// Failing step
        step: String,
        /// Transform error
        source: TransformError,
    },

    /// A step returned a failed no-throw result
    #[error("Step `{step}` returned a failed result: {}", .violations.join("; "))]
    StepReturnedFailure {
        /// Failing step
        step: String,
        /// Violations carried by the result
        violations: Vec<String>,
    },
}

impl ExecutionError {
    /// Name of the step that failed
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::InvalidStepInput { step, .. }
            | Self::StepFailed { step, .. }
            | Self::StepReturnedFailure { step, .. } => step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ExecutionError::InvalidStepInput {
            step: "step_a".to_string(),
            spec: "ExampleOneVarSchemaV1".to_string(),
            details: "missing required field `var`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Input to step `step_a` doesn't conform to specification `ExampleOneVarSchemaV1`. Details: missing required field `var`"
        );
        assert_eq!(err.step(), "step_a");

        let err = ExecutionError::StepReturnedFailure {
            step: "step_b".to_string(),
            violations: vec!["womp".to_string(), "womp".to_string()],
        };
        assert_eq!(err.to_string(), "Step `step_b` returned a failed result: womp; womp");
    }
}
