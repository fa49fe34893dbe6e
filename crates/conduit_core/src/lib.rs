//! Conduit Core Types
//!
//! The specification capability every transform is declared against, a
//! record-schema implementation of it, and the no-throw result type used
//! to report failures as values.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;
pub mod result;
pub mod schema;
pub mod spec;

// Re-exports
pub use error::{ConversionError, CoreError, CoreResult};
pub use id::RunId;
pub use result::{NoThrowResult, identity_no_throw_result};
pub use schema::RecordSchema;
pub use spec::{
    FieldDict, FieldEntry, FieldType, NoThrowSpec, SpecRef, Specification, is_compatible,
    same_shape, unwrap_no_throw,
};
