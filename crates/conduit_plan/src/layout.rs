//! Renderer-facing pipeline structure.
//!
//! Plain serializable data; drawing it is left to the caller.

use super::dag::Pipeline;
use conduit_core::SpecRef;
use conduit_transform::Transform;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Specification summary: name plus field types rendered as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLayout {
    /// Specification name
    pub name: String,
    /// Field name to type name
    pub fields: IndexMap<String, String>,
}

impl SpecLayout {
    fn of(spec: &SpecRef) -> Self {
        Self {
            name: spec.name().to_string(),
            fields: spec
                .field_dict()
                .into_iter()
                .map(|(name, entry)| (name, entry.to_string()))
                .collect(),
        }
    }
}

/// One step of the layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepLayout {
    /// Step name
    pub name: String,
    /// Description of the applied function
    pub transform: String,
    /// Whether failures are reported as values
    pub no_throw: bool,
    /// Declared input
    pub input: SpecLayout,
    /// Declared output
    pub output: SpecLayout,
}

/// Execution order edge between consecutive steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEdge {
    /// Earlier step
    pub from: String,
    /// Next step
    pub to: String,
}

/// Data flow from an upstream step into a consuming step's assembler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEdge {
    /// Step whose output is read
    pub from: String,
    /// Step whose assembler reads it
    pub to: String,
    /// Fields read, in first-read order
    pub fields: Vec<String>,
}

/// Structure of a pipeline for visualization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineLayout {
    /// Steps in execution order
    pub steps: Vec<StepLayout>,
    /// Sequence edges, `step[i] -> step[i + 1]`
    pub edges: Vec<LayoutEdge>,
    /// Data edges, one per (upstream, consumer) pair
    pub data_edges: Vec<DataEdge>,
}

impl PipelineLayout {
    pub(crate) fn of(pipeline: &Pipeline) -> Self {
        let steps: Vec<StepLayout> = pipeline
            .steps()
            .map(|step| StepLayout {
                name: step.name.to_string(),
                transform: step.transform.describe(),
                no_throw: step.transform.is_no_throw(),
                input: SpecLayout::of(step.transform.input_specification()),
                output: SpecLayout::of(step.transform.output_specification()),
            })
            .collect();

        let edges = steps
            .windows(2)
            .map(|pair| LayoutEdge {
                from: pair[0].name.clone(),
                to: pair[1].name.clone(),
            })
            .collect();

        let mut data_edges = Vec::new();
        for step in pipeline.steps() {
            let Some(reads) = pipeline.step_reads(step.name) else {
                continue;
            };
            let mut by_upstream: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
            for access in reads {
                by_upstream
                    .entry(access.step.as_str())
                    .or_default()
                    .insert(access.field.as_str());
            }
            data_edges.extend(by_upstream.into_iter().map(|(from, fields)| DataEdge {
                from: from.to_string(),
                to: step.name.to_string(),
                fields: fields.into_iter().map(str::to_string).collect(),
            }));
        }

        Self {
            steps,
            edges,
            data_edges,
        }
    }
}
