//! Pipeline steps.

use conduit_core::SpecRef;
use conduit_transform::{InputAssembler, NoThrowTransform, Transform, TransformSpec};
use std::fmt;

/// Transform applied by a pipeline step
#[derive(Debug, Clone)]
pub enum StepTransform {
    /// Ordinary transform; failures terminate the run with a wrapped cause
    Plain(TransformSpec),
    /// No-throw transform; failures terminate the run verbatim
    NoThrow(NoThrowTransform),
}

impl StepTransform {
    /// Check if this step reports failures as values
    #[must_use]
    pub fn is_no_throw(&self) -> bool {
        matches!(self, Self::NoThrow(_))
    }
}

impl Transform for StepTransform {
    fn input_specification(&self) -> &SpecRef {
        match self {
            Self::Plain(t) => t.input_specification(),
            Self::NoThrow(t) => t.input_specification(),
        }
    }

    fn output_specification(&self) -> &SpecRef {
        match self {
            Self::Plain(t) => t.output_specification(),
            Self::NoThrow(t) => t.output_specification(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Plain(t) => t.describe(),
            Self::NoThrow(t) => t.describe(),
        }
    }
}

impl From<TransformSpec> for StepTransform {
    fn from(t: TransformSpec) -> Self {
        Self::Plain(t)
    }
}

impl From<NoThrowTransform> for StepTransform {
    fn from(t: NoThrowTransform) -> Self {
        Self::NoThrow(t)
    }
}

impl fmt::Display for StepTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(t) => write!(f, "{}", t),
            Self::NoThrow(t) => write!(f, "{}", t),
        }
    }
}

/// A named step: how to build its input, and what to apply to it
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Name, unique within a pipeline
    pub name: String,
    /// Builds the step input from upstream outputs; `None` only for the first step
    pub assembler: Option<InputAssembler>,
    /// Transform applied to the assembled input
    pub transform: StepTransform,
}

impl PipelineStep {
    /// Create a step
    pub fn new(
        name: impl Into<String>,
        assembler: Option<InputAssembler>,
        transform: impl Into<StepTransform>,
    ) -> Self {
        Self {
            name: name.into(),
            assembler,
            transform: transform.into(),
        }
    }

    /// First step of a pipeline, consuming the pipeline input directly
    pub fn first(name: impl Into<String>, transform: impl Into<StepTransform>) -> Self {
        Self::new(name, None, transform)
    }

    /// Downstream step whose input is assembled from earlier outputs
    pub fn downstream(
        name: impl Into<String>,
        assembler: InputAssembler,
        transform: impl Into<StepTransform>,
    ) -> Self {
        Self::new(name, Some(assembler), transform)
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.transform)
    }
}
