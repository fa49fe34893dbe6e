//! Conduit Planner
//!
//! Builds validated pipelines: ordered, uniquely named steps whose input
//! assemblers are checked against the declared outputs of the steps they
//! read, before any data flows.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dag;
pub mod layout;
pub mod step;
pub mod validate;

pub use dag::{Pipeline, StepRef};
pub use layout::{DataEdge, LayoutEdge, PipelineLayout, SpecLayout, StepLayout};
pub use step::{PipelineStep, StepTransform};
pub use validate::{PlanResult, StepReads, ValidationError, Validator};
