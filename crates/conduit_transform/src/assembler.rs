//! Input assemblers.
//!
//! An [`InputAssembler`] builds the input of one pipeline step from the
//! outputs of the steps before it. It reads those outputs through an
//! [`Upstream`] view, which records every `(step, field)` pair requested.
//!
//! The same assembler runs against two kinds of view:
//!
//! - a live view over real step outputs, during execution;
//! - a probe view over placeholder records synthesized from each upstream
//!   step's declared output specification, while a pipeline is being built.
//!   Probe reads never fail, so the assembler runs as far as its logic
//!   allows and the recorded accesses can be checked against the declared
//!   fields before any data exists.
//!
//! Only direct field reads are captured. Branches taken on placeholder
//! values are not representative of real data.

use crate::error::AssembleError;
use crate::transform::panic_message;
use conduit_core::{NoThrowResult, SpecRef};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::ops::Index;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Signature of an assembler function
pub type AssembleFn = dyn Fn(&Upstream<'_>) -> anyhow::Result<Value> + Send + Sync;

/// One field read from one upstream step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldAccess {
    /// Upstream step name
    pub step: String,
    /// Field read from its output
    pub field: String,
}

impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.step, self.field)
    }
}

/// Recorded output of one executed step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Output of an ordinary transform
    Plain(Value),
    /// Output of a no-throw transform
    NoThrow(NoThrowResult<Value>),
}

impl StepOutput {
    /// Output record, unwrapping a successful no-throw result
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::NoThrow(result) => result.result(),
        }
    }

    /// Consume into the output record
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::NoThrow(result) => result.into_result(),
        }
    }

    /// Warnings attached to the output
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Plain(_) => &[],
            Self::NoThrow(result) => result.warnings(),
        }
    }
}

enum Source<'a> {
    Live(&'a IndexMap<String, StepOutput>),
    Probe(IndexMap<String, Value>),
}

/// Read access to upstream step outputs, keyed by step name
pub struct Upstream<'a> {
    source: Source<'a>,
    accesses: RefCell<IndexSet<FieldAccess>>,
}

impl<'a> Upstream<'a> {
    /// View over real outputs of already-executed steps
    #[must_use]
    pub fn live(outputs: &'a IndexMap<String, StepOutput>) -> Self {
        Self {
            source: Source::Live(outputs),
            accesses: RefCell::new(IndexSet::new()),
        }
    }

    /// Placeholder view over the declared outputs of upstream steps
    #[must_use]
    pub fn probe<'s>(specs: impl IntoIterator<Item = (&'s str, &'s SpecRef)>) -> Self {
        let samples = specs
            .into_iter()
            .map(|(step, spec)| (step.to_string(), spec.sample()))
            .collect();
        Self {
            source: Source::Probe(samples),
            accesses: RefCell::new(IndexSet::new()),
        }
    }

    /// Check if this is a probe view
    #[must_use]
    pub fn is_probe(&self) -> bool {
        matches!(self.source, Source::Probe(_))
    }

    /// Names of the steps visible through this view
    #[must_use]
    pub fn steps(&self) -> Vec<&str> {
        match &self.source {
            Source::Live(outputs) => outputs.keys().map(String::as_str).collect(),
            Source::Probe(samples) => samples.keys().map(String::as_str).collect(),
        }
    }

    /// Read one field from a step's output.
    ///
    /// # Errors
    ///
    /// On a live view, returns error if the step has no output or the output
    /// has no such field. A probe view returns null instead.
    pub fn field(&self, step: &str, field: &str) -> Result<Value, AssembleError> {
        self.record(step, field);

        match &self.source {
            Source::Live(outputs) => {
                let record = outputs
                    .get(step)
                    .and_then(StepOutput::value)
                    .ok_or_else(|| AssembleError::UnknownStep {
                        step: step.to_string(),
                    })?;
                record
                    .get(field)
                    .cloned()
                    .ok_or_else(|| AssembleError::MissingField {
                        step: step.to_string(),
                        field: field.to_string(),
                    })
            }
            Source::Probe(samples) => Ok(samples
                .get(step)
                .and_then(|record| record.get(field))
                .cloned()
                .unwrap_or(Value::Null)),
        }
    }

    /// Read a string field from a step's output
    ///
    /// # Errors
    ///
    /// Returns error as [`Upstream::field`] does, or if a live value is not a
    /// string
    pub fn text(&self, step: &str, field: &str) -> Result<String, AssembleError> {
        match self.field(step, field)? {
            Value::String(s) => Ok(s),
            _ if self.is_probe() => Ok(String::new()),
            _ => Err(AssembleError::TypeMismatch {
                step: step.to_string(),
                field: field.to_string(),
                expected: "a string".to_string(),
            }),
        }
    }

    /// Output record of a step, as a view whose field reads are recorded
    /// like [`Upstream::field`].
    ///
    /// # Errors
    ///
    /// On a live view, returns error if the step has no output. A probe view
    /// hands out an empty record for unknown steps, so the reads made through
    /// it still surface as accesses.
    pub fn output<'s>(&'s self, step: &str) -> Result<StepRecord<'s>, AssembleError> {
        let record = match &self.source {
            Source::Live(outputs) => outputs
                .get(step)
                .and_then(StepOutput::value)
                .ok_or_else(|| AssembleError::UnknownStep {
                    step: step.to_string(),
                })?,
            Source::Probe(samples) => samples.get(step).unwrap_or(&NULL),
        };
        Ok(StepRecord {
            upstream: self,
            step: step.to_string(),
            record,
        })
    }

    fn record(&self, step: &str, field: &str) {
        self.accesses.borrow_mut().insert(FieldAccess {
            step: step.to_string(),
            field: field.to_string(),
        });
    }

    /// Fields read so far
    #[must_use]
    pub fn accesses(&self) -> IndexSet<FieldAccess> {
        self.accesses.borrow().clone()
    }
}

static NULL: Value = Value::Null;

/// One upstream step's output, read field by field.
///
/// Indexing with a missing field yields null, as indexing a [`Value`] does.
#[derive(Clone)]
pub struct StepRecord<'u> {
    upstream: &'u Upstream<'u>,
    step: String,
    record: &'u Value,
}

impl<'u> StepRecord<'u> {
    /// Name of the step this record came from
    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Field value, if present
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'u Value> {
        self.upstream.record(&self.step, field);
        self.record.get(field)
    }

    /// Read one field, as [`Upstream::field`] does
    ///
    /// # Errors
    ///
    /// Returns error as [`Upstream::field`] does
    pub fn field(&self, field: &str) -> Result<Value, AssembleError> {
        self.upstream.field(&self.step, field)
    }

    /// Read a string field, as [`Upstream::text`] does
    ///
    /// # Errors
    ///
    /// Returns error as [`Upstream::text`] does
    pub fn text(&self, field: &str) -> Result<String, AssembleError> {
        self.upstream.text(&self.step, field)
    }
}

impl Index<&str> for StepRecord<'_> {
    type Output = Value;

    fn index(&self, field: &str) -> &Value {
        self.get(field).unwrap_or(&NULL)
    }
}

impl fmt::Debug for StepRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRecord")
            .field("step", &self.step)
            .field("record", self.record)
            .finish_non_exhaustive()
    }
}

/// Transform from upstream step outputs to one step's input
#[derive(Clone)]
pub struct InputAssembler {
    func: Arc<AssembleFn>,
}

impl InputAssembler {
    /// Create an assembler from a function of the upstream view.
    ///
    /// The returned record is coerced into the consuming step's input
    /// specification before the step runs.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Upstream<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Build a step input from upstream outputs
    ///
    /// # Errors
    ///
    /// Returns any error raised by the assembler function
    pub fn assemble(&self, upstream: &Upstream<'_>) -> anyhow::Result<Value> {
        (self.func)(upstream)
    }

    /// Run the assembler once against `probe` and collect the fields it read.
    ///
    /// Errors and panics from the run are returned alongside the accesses
    /// instead of being raised; they are expected when placeholders stand in
    /// for real values. A caught panic still goes through the process panic
    /// hook, so the default hook prints its message to stderr. Install a
    /// quieter hook with [`std::panic::set_hook`] if that output is unwanted.
    pub fn trace(&self, probe: &Upstream<'_>) -> (IndexSet<FieldAccess>, Option<String>) {
        let failure = match catch_unwind(AssertUnwindSafe(|| self.assemble(probe))) {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(format!("{err:#}")),
            Err(payload) => Some(panic_message(payload)),
        };
        (probe.accesses(), failure)
    }
}

impl fmt::Debug for InputAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputAssembler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{FieldType, RecordSchema};
    use serde_json::json;

    fn one_var() -> SpecRef {
        RecordSchema::new("ExampleOneVarSchemaV1")
            .with_field("var", FieldType::String)
            .build()
    }

    fn step_c_assembler() -> InputAssembler {
        InputAssembler::new(|upstream| {
            Ok(json!({
                "var1": upstream.text("step_a", "var")?,
                "var2": upstream.text("step_b", "var")?,
            }))
        })
    }

    #[test]
    fn test_assemble_live() {
        let mut outputs = IndexMap::new();
        outputs.insert("step_a".to_string(), StepOutput::Plain(json!({"var": "a"})));
        outputs.insert(
            "step_b".to_string(),
            StepOutput::NoThrow(NoThrowResult::success(json!({"var": "b"}))),
        );
        let upstream = Upstream::live(&outputs);

        let input = step_c_assembler().assemble(&upstream).unwrap();
        assert_eq!(input, json!({"var1": "a", "var2": "b"}));
        assert_eq!(upstream.steps(), ["step_a", "step_b"]);
    }

    #[test]
    fn test_live_missing_field_errors() {
        let mut outputs = IndexMap::new();
        outputs.insert("step_a".to_string(), StepOutput::Plain(json!({"other": "a"})));
        let upstream = Upstream::live(&outputs);

        let err = upstream.field("step_a", "var").unwrap_err();
        assert_eq!(
            err,
            AssembleError::MissingField {
                step: "step_a".to_string(),
                field: "var".to_string()
            }
        );
        assert!(matches!(
            upstream.field("step_z", "var"),
            Err(AssembleError::UnknownStep { .. })
        ));
    }

    #[test]
    fn test_live_type_mismatch() {
        let mut outputs = IndexMap::new();
        outputs.insert("step_a".to_string(), StepOutput::Plain(json!({"var": 1})));
        let upstream = Upstream::live(&outputs);
        assert!(matches!(
            upstream.text("step_a", "var"),
            Err(AssembleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_trace_records_all_reads() {
        let spec = one_var();
        let probe = Upstream::probe([("step_a", &spec), ("step_b", &spec)]);
        let (accesses, failure) = step_c_assembler().trace(&probe);

        assert!(failure.is_none());
        let expected: Vec<FieldAccess> = ["step_a", "step_b"]
            .iter()
            .map(|step| FieldAccess {
                step: step.to_string(),
                field: "var".to_string(),
            })
            .collect();
        assert_eq!(accesses.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_trace_keeps_reading_past_unknown_fields() {
        let spec = one_var();
        let probe = Upstream::probe([("step_a", &spec)]);
        let assembler = InputAssembler::new(|upstream| {
            let missing = upstream.text("step_a", "nope")?;
            let present = upstream.text("step_a", "var")?;
            Ok(json!({ "var": format!("{missing}{present}") }))
        });

        let (accesses, _) = assembler.trace(&probe);
        assert_eq!(accesses.len(), 2);
        assert!(accesses.iter().any(|a| a.field == "nope"));
    }

    #[test]
    fn test_trace_swallows_panics() {
        let spec = one_var();
        let probe = Upstream::probe([("step_a", &spec)]);
        let assembler = InputAssembler::new(|upstream| {
            let value = upstream.field("step_a", "var")?;
            if value.as_str() == Some("") {
                panic!("placeholder rejected");
            }
            Ok(value)
        });

        let (accesses, failure) = assembler.trace(&probe);
        assert_eq!(accesses.len(), 1);
        assert_eq!(failure.as_deref(), Some("placeholder rejected"));
    }

    #[test]
    fn test_output_reads_are_recorded() {
        let mut outputs = IndexMap::new();
        outputs.insert("step_a".to_string(), StepOutput::Plain(json!({"var": "a"})));
        let upstream = Upstream::live(&outputs);

        let record = upstream.output("step_a").unwrap();
        assert!(upstream.accesses().is_empty());
        assert_eq!(record["var"], json!("a"));
        assert_eq!(record["typo"], Value::Null);
        assert_eq!(
            upstream.accesses().into_iter().collect::<Vec<_>>(),
            [
                FieldAccess { step: "step_a".to_string(), field: "var".to_string() },
                FieldAccess { step: "step_a".to_string(), field: "typo".to_string() },
            ]
        );
        assert!(upstream.output("step_b").is_err());
    }

    #[test]
    fn test_placeholder_output_of_unknown_step_records_reads() {
        let upstream = Upstream::probe(std::iter::empty::<(&str, &SpecRef)>());
        let record = upstream.output("ghost").unwrap();
        assert_eq!(record.step(), "ghost");
        assert_eq!(record["var"], Value::Null);
        assert!(upstream.accesses().contains(&FieldAccess {
            step: "ghost".to_string(),
            field: "var".to_string(),
        }));
    }

    #[test]
    fn test_step_output_value() {
        let failed = StepOutput::NoThrow(NoThrowResult::violation("bad"));
        assert!(failed.value().is_none());
        let ok = StepOutput::NoThrow(NoThrowResult::success_with_warnings(json!(1), ["w"]));
        assert_eq!(ok.warnings(), ["w"]);
        assert_eq!(ok.into_value(), Some(json!(1)));
    }
}
