//! Conduit Runtime
//!
//! Executes validated pipelines. Normal execution never fails by error or
//! panic: the outcome, good or bad, is a `NoThrowResult`. A force-throw
//! mode exists for debugging and lets failures propagate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod executor;

pub use error::ExecutionError;
pub use executor::{Executor, ExecutorConfig, execute, execute_force_throw};
