//! Conduit Transforms
//!
//! Transforms declared against input and output specifications, the
//! no-throw adapter that turns every failure into a violation, and the
//! input assemblers that route upstream outputs into a pipeline step.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembler;
pub mod error;
pub mod nothrow;
pub mod transform;

pub use assembler::{FieldAccess, InputAssembler, StepOutput, StepRecord, Upstream};
pub use error::{AssembleError, TransformError};
pub use nothrow::NoThrowTransform;
pub use transform::{IDENTITY_FN_NAME, Outcome, Transform, TransformFn, TransformSpec, panic_message};
