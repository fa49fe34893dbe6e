//! Validated pipeline of named steps.
//!
//! A [`Pipeline`] is a linear DAG: steps execute in insertion order, and
//! each step after the first reads any subset of the outputs that came
//! before it through its input assembler. All wiring is checked once, in
//! [`Pipeline::build`]; a built pipeline is immutable.

use super::layout::PipelineLayout;
use super::step::{PipelineStep, StepTransform};
use super::validate::{PlanResult, StepReads, ValidationError, Validator};
use conduit_core::{SpecRef, unwrap_no_throw};
use conduit_transform::{FieldAccess, InputAssembler, Transform};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Borrowed view of one step of a built pipeline
#[derive(Debug, Clone, Copy)]
pub struct StepRef<'a> {
    /// Step name
    pub name: &'a str,
    /// Input assembler; `None` for the first step
    pub assembler: Option<&'a InputAssembler>,
    /// Transform applied by the step
    pub transform: &'a StepTransform,
}

/// An ordered, validated sequence of pipeline steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    step_transforms: IndexMap<String, StepTransform>,
    step_assemblers: HashMap<String, InputAssembler>,
    step_reads: StepReads,
    input: SpecRef,
    output: SpecRef,
    validator: Validator,
}

impl Pipeline {
    /// Build a pipeline with the default validator
    ///
    /// # Errors
    ///
    /// Returns error if the steps do not form a valid pipeline
    pub fn build(steps: impl IntoIterator<Item = PipelineStep>) -> PlanResult<Self> {
        Self::build_with(steps, &Validator::default())
    }

    /// Build a pipeline, validating it with `validator`
    ///
    /// # Errors
    ///
    /// Returns error if the steps do not form a valid pipeline
    pub fn build_with(
        steps: impl IntoIterator<Item = PipelineStep>,
        validator: &Validator,
    ) -> PlanResult<Self> {
        let steps: Vec<PipelineStep> = steps.into_iter().collect();

        let step_reads = match validator.validate(&steps) {
            Ok(reads) => reads,
            Err(err) => {
                warn!(error = %err, "rejected pipeline");
                return Err(err);
            }
        };

        let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
            return Err(ValidationError::Empty);
        };
        let input = first.transform.input_specification().clone();
        let output = last.transform.output_specification().clone();

        let mut step_transforms = IndexMap::with_capacity(steps.len());
        let mut step_assemblers = HashMap::new();
        for step in steps {
            if let Some(assembler) = step.assembler {
                step_assemblers.insert(step.name.clone(), assembler);
            }
            step_transforms.insert(step.name, step.transform);
        }

        info!(
            steps = step_transforms.len(),
            input = %input.name(),
            output = %output.name(),
            "built pipeline"
        );

        Ok(Self {
            step_transforms,
            step_assemblers,
            step_reads,
            input,
            output,
            validator: validator.clone(),
        })
    }

    /// Steps in execution order
    pub fn steps(&self) -> impl Iterator<Item = StepRef<'_>> {
        self.step_transforms.iter().map(|(name, transform)| StepRef {
            name,
            assembler: self.step_assemblers.get(name),
            transform,
        })
    }

    /// Look up a step by name
    #[must_use]
    pub fn step(&self, name: &str) -> Option<StepRef<'_>> {
        let (name, transform) = self.step_transforms.get_key_value(name)?;
        Some(StepRef {
            name,
            assembler: self.step_assemblers.get(name),
            transform,
        })
    }

    /// Look up a step by position
    #[must_use]
    pub fn step_at(&self, index: usize) -> Option<StepRef<'_>> {
        let (name, transform) = self.step_transforms.get_index(index)?;
        Some(StepRef {
            name,
            assembler: self.step_assemblers.get(name),
            transform,
        })
    }

    /// Step names in execution order
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.step_transforms.keys().map(String::as_str).collect()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.step_transforms.len()
    }

    /// Always false for a built pipeline
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.step_transforms.is_empty()
    }

    /// Upstream fields read by a step's assembler, as recorded during validation
    #[must_use]
    pub fn step_reads(&self, name: &str) -> Option<&IndexSet<FieldAccess>> {
        self.step_reads.get(name)
    }

    /// Specification of the pipeline input (the first step's input)
    #[must_use]
    pub fn input_specification(&self) -> &SpecRef {
        &self.input
    }

    /// Specification of the pipeline output (the last step's output)
    #[must_use]
    pub fn output_specification(&self) -> &SpecRef {
        &self.output
    }

    /// Rebuild a pipeline from the first `n` steps, for bisecting a failing
    /// run. `n` past the end keeps every step.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] when `n` is zero
    pub fn prefix(&self, n: usize) -> PlanResult<Self> {
        let steps = self.steps().take(n).map(|step| PipelineStep {
            name: step.name.to_string(),
            assembler: step.assembler.cloned(),
            transform: step.transform.clone(),
        });
        Self::build_with(steps, &self.validator)
    }

    /// Renderer-facing structure of this pipeline
    #[must_use]
    pub fn layout(&self) -> PipelineLayout {
        PipelineLayout::of(self)
    }
}

impl Transform for Pipeline {
    fn input_specification(&self) -> &SpecRef {
        &self.input
    }

    fn output_specification(&self) -> &SpecRef {
        &self.output
    }

    fn describe(&self) -> String {
        format!("pipeline `{}`", self.step_names().join(" -> "))
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pipeline ({} => {}):",
            self.input.name(),
            unwrap_no_throw(&self.output).name()
        )?;
        let last = self.len().saturating_sub(1);
        for (index, step) in self.steps().enumerate() {
            let marker = match index {
                0 => "🌱",
                i if i == last => "🌷",
                _ => " ·",
            };
            writeln!(f, "  {} {}: {}", marker, step.name, step.transform)?;
        }
        Ok(())
    }
}
