//! Pipeline validator.
//!
//! Runs once, while a pipeline is being built. Besides the structural
//! checks (unique names, assembler placement), every input assembler is
//! traced against probes of the steps preceding it, and each field it
//! reads is looked up in that step's declared output specification.

use super::step::PipelineStep;
use conduit_core::SpecRef;
use conduit_transform::{FieldAccess, Transform, Upstream};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Result type for pipeline construction
pub type PlanResult<T> = Result<T, ValidationError>;

/// Fields each step's assembler reads, keyed by step name
pub type StepReads = IndexMap<String, IndexSet<FieldAccess>>;

/// Construction-time validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No steps supplied
    #[error("a pipeline requires at least one step")]
    Empty,

    /// Step count over the configured limit
    #[error("pipeline has {count} steps, exceeding the limit of {max}")]
    TooManySteps {
        /// Supplied step count
        count: usize,
        /// Configured limit
        max: usize,
    },

    /// Two steps share a name
    #[error("duplicate step name `{name}`")]
    DuplicateStepName {
        /// Repeated name
        name: String,
    },

    /// The first step consumes the pipeline input, so it cannot assemble one
    #[error("first step `{name}` must not have an input assembler")]
    FirstStepHasAssembler {
        /// Step name
        name: String,
    },

    /// A non-first step has no way to build its input
    #[error("step `{name}` requires an input assembler")]
    MissingAssembler {
        /// Step name
        name: String,
    },

    /// An assembler reads from a step that does not run before it
    #[error("input assembler of step `{step}` reads from `{upstream}`, which is not an upstream step")]
    UnknownUpstream {
        /// Step owning the assembler
        step: String,
        /// Step that was read
        upstream: String,
    },

    /// An assembler reads a field the upstream step does not produce
    #[error(
        "input assembler of step `{step}` reads field `{field}` from step `{upstream}`, but its output specification `{spec}` has no such field"
    )]
    MissingField {
        /// Step owning the assembler
        step: String,
        /// Step that was read
        upstream: String,
        /// Field that was read
        field: String,
        /// Declared output specification of `upstream`
        spec: String,
    },
}

/// Validator for pipeline construction
#[derive(Debug, Clone)]
pub struct Validator {
    /// Check traced field reads against upstream output specifications
    pub check_fields: bool,
    /// Maximum allowed steps (0 = no limit)
    pub max_steps: usize,
}

impl Validator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            check_fields: true,
            max_steps: 0,
        }
    }

    /// Validate an ordered list of steps.
    ///
    /// Returns, per step, the upstream fields its assembler reads.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in step order
    pub fn validate(&self, steps: &[PipelineStep]) -> PlanResult<StepReads> {
        let Some(first) = steps.first() else {
            return Err(ValidationError::Empty);
        };

        if self.max_steps > 0 && steps.len() > self.max_steps {
            return Err(ValidationError::TooManySteps {
                count: steps.len(),
                max: self.max_steps,
            });
        }

        let mut names = IndexSet::new();
        for step in steps {
            if !names.insert(step.name.as_str()) {
                return Err(ValidationError::DuplicateStepName {
                    name: step.name.clone(),
                });
            }
        }

        if first.assembler.is_some() {
            return Err(ValidationError::FirstStepHasAssembler {
                name: first.name.clone(),
            });
        }
        if let Some(step) = steps[1..].iter().find(|s| s.assembler.is_none()) {
            return Err(ValidationError::MissingAssembler {
                name: step.name.clone(),
            });
        }

        let mut reads = StepReads::new();
        for (index, step) in steps.iter().enumerate() {
            let accesses = self.validate_step(&steps[..index], step)?;
            reads.insert(step.name.clone(), accesses);
        }
        Ok(reads)
    }

    /// Validate one step's assembler against the steps that precede it.
    ///
    /// `upstream` must hold exactly the steps that run before `step`;
    /// anything else may accept reads that fail at run time.
    ///
    /// # Errors
    ///
    /// Returns error if the assembler reads a step not in `upstream`, or a
    /// field missing from that step's output specification
    pub fn validate_step(
        &self,
        upstream: &[PipelineStep],
        step: &PipelineStep,
    ) -> PlanResult<IndexSet<FieldAccess>> {
        let Some(assembler) = &step.assembler else {
            return Ok(IndexSet::new());
        };

        let specs: IndexMap<&str, &SpecRef> = upstream
            .iter()
            .map(|s| (s.name.as_str(), s.transform.output_specification()))
            .collect();

        let probe = Upstream::probe(specs.iter().map(|(name, spec)| (*name, *spec)));
        let (accesses, failure) = assembler.trace(&probe);
        if let Some(reason) = failure {
            debug!(step = %step.name, %reason, "assembler failed against probes");
        }

        if self.check_fields {
            for access in &accesses {
                let spec = specs.get(access.step.as_str()).ok_or_else(|| {
                    ValidationError::UnknownUpstream {
                        step: step.name.clone(),
                        upstream: access.step.clone(),
                    }
                })?;
                if !spec.field_dict().contains_key(&access.field) {
                    return Err(ValidationError::MissingField {
                        step: step.name.clone(),
                        upstream: access.step.clone(),
                        field: access.field.clone(),
                        spec: spec.name().to_string(),
                    });
                }
            }
        }

        debug!(step = %step.name, reads = accesses.len(), "validated input assembler");
        Ok(accesses)
    }

    /// Enable or disable field checks
    #[must_use]
    pub fn with_field_checks(mut self, check: bool) -> Self {
        self.check_fields = check;
        self
    }

    /// Set maximum step count
    #[must_use]
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{FieldType, NoThrowSpec, RecordSchema};
    use conduit_transform::{InputAssembler, NoThrowTransform, TransformSpec};
    use proptest::prelude::*;
    use serde_json::json;

    fn one_var() -> SpecRef {
        RecordSchema::new("ExampleOneVarSchemaV1")
            .with_field("var", FieldType::String)
            .build()
    }

    fn passthrough(name: &str) -> NoThrowTransform {
        NoThrowTransform::from_fn(one_var(), one_var(), name.to_string(), |v| Ok(v))
    }

    fn reads(step: &'static str, field: &'static str) -> InputAssembler {
        InputAssembler::new(move |up| Ok(json!({ "var": up.text(step, field)? })))
    }

    #[test]
    fn test_validator_new() {
        let validator = Validator::new();
        assert!(validator.check_fields);
        assert_eq!(validator.max_steps, 0);
    }

    #[test]
    fn test_validator_with_options() {
        let validator = Validator::new().with_field_checks(false).with_max_steps(10);
        assert!(!validator.check_fields);
        assert_eq!(validator.max_steps, 10);
    }

    #[test]
    fn test_validate_empty() {
        assert_eq!(Validator::new().validate(&[]), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_too_many_steps() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", reads("a", "var"), passthrough("fn_b")),
        ];
        let err = Validator::new().with_max_steps(1).validate(&steps).unwrap_err();
        assert_eq!(err, ValidationError::TooManySteps { count: 2, max: 1 });
    }

    #[test]
    fn test_validate_reports_first_duplicate() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", reads("a", "var"), passthrough("fn_b")),
            PipelineStep::downstream("b", reads("a", "var"), passthrough("fn_b")),
            PipelineStep::downstream("a", reads("a", "var"), passthrough("fn_a")),
        ];
        let err = Validator::new().validate(&steps).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateStepName {
                name: "b".to_string()
            }
        );
    }

    #[test]
    fn test_validate_first_step_with_assembler() {
        let steps = vec![PipelineStep::downstream("a", reads("a", "var"), passthrough("fn_a"))];
        assert_eq!(
            Validator::new().validate(&steps),
            Err(ValidationError::FirstStepHasAssembler {
                name: "a".to_string()
            })
        );
    }

    #[test]
    fn test_validate_missing_assembler() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::first("b", passthrough("fn_b")),
        ];
        assert_eq!(
            Validator::new().validate(&steps),
            Err(ValidationError::MissingAssembler {
                name: "b".to_string()
            })
        );
    }

    #[test]
    fn test_validate_missing_field() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", reads("a", "not_a_field"), passthrough("fn_b")),
        ];
        assert_eq!(
            Validator::new().validate(&steps),
            Err(ValidationError::MissingField {
                step: "b".to_string(),
                upstream: "a".to_string(),
                field: "not_a_field".to_string(),
                spec: "NoThrowResult<ExampleOneVarSchemaV1>".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_missing_field_on_unexercised_branch() {
        let assembler = InputAssembler::new(|up| {
            let var = up.text("a", "var")?;
            if var == "never on probes" {
                return Ok(json!({ "var": var }));
            }
            Ok(json!({ "var": up.text("a", "typo")? }))
        });
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", assembler, passthrough("fn_b")),
        ];
        assert!(matches!(
            Validator::new().validate(&steps),
            Err(ValidationError::MissingField { ref field, .. }) if field == "typo"
        ));
    }

    #[test]
    fn test_validate_downstream_read() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", reads("c", "var"), passthrough("fn_b")),
            PipelineStep::downstream("c", reads("a", "var"), passthrough("fn_c")),
        ];
        assert_eq!(
            Validator::new().validate(&steps),
            Err(ValidationError::UnknownUpstream {
                step: "b".to_string(),
                upstream: "c".to_string()
            })
        );
    }

    #[test]
    fn test_validate_without_field_checks() {
        let steps = vec![
            PipelineStep::first("a", passthrough("fn_a")),
            PipelineStep::downstream("b", reads("a", "not_a_field"), passthrough("fn_b")),
        ];
        let reads = Validator::new().with_field_checks(false).validate(&steps).unwrap();
        assert_eq!(reads["b"].len(), 1);
    }

    #[test]
    fn test_validate_reads_through_plain_no_throw_output() {
        let first = TransformSpec::new(one_var(), NoThrowSpec::wrap(one_var()), "fn_a", |v| Ok(v));
        let steps = vec![
            PipelineStep::first("a", first),
            PipelineStep::downstream("b", reads("a", "var"), passthrough("fn_b")),
        ];
        let reads = Validator::new().validate(&steps).unwrap();
        assert!(reads["a"].is_empty());
        assert_eq!(reads["b"].len(), 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_duplicate_names_rejected(names in proptest::collection::vec("[a-c]", 1..6)) {
            let mut steps = vec![PipelineStep::first(names[0].clone(), passthrough("fn"))];
            for name in &names[1..] {
                steps.push(PipelineStep::downstream(name.clone(), reads("unused", "var"), passthrough("fn")));
            }
            let unique = names.iter().collect::<IndexSet<_>>().len() == names.len();
            let result = Validator::new().with_field_checks(false).validate(&steps);
            prop_assert_eq!(
                matches!(result, Err(ValidationError::DuplicateStepName { .. })),
                !unique
            );
            if unique {
                prop_assert!(result.is_ok());
            }
        }
    }
}
