//! No-throw results.
//!
//! A [`NoThrowResult`] carries either a payload (success) or a non-empty
//! list of violations (failure), plus advisory warnings in both cases.
//! Results never nest: wrapping one result inside another collapses to a
//! single flat result whose diagnostics are the inner ones followed by the
//! outer ones.
//!
//! On the wire a result is `{"result", "violations", "warnings"}`. A null
//! `result` with no violations decodes as a successful null payload when the
//! payload type admits one, so `success(Value::Null)` survives a round trip.

use crate::error::{CoreError, CoreResult};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Outcome of a transform that reports failure as a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "ResultParts<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct NoThrowResult<T> {
    result: Option<T>,
    violations: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ResultParts<T> {
    #[serde(default, deserialize_with = "payload")]
    result: Option<Payload<T>>,
    #[serde(default)]
    violations: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

enum Payload<T> {
    Value(T),
    /// Explicit null, kept as `T` when the type has a null value
    Null(Option<T>),
}

fn payload<'de, D, T>(deserializer: D) -> Result<Option<Payload<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let payload = match Option::<T>::deserialize(deserializer)? {
        Some(value) => Payload::Value(value),
        None => Payload::Null(
            T::deserialize(<() as IntoDeserializer<'de, D::Error>>::into_deserializer(())).ok(),
        ),
    };
    Ok(Some(payload))
}

impl<T> TryFrom<ResultParts<T>> for NoThrowResult<T> {
    type Error = CoreError;

    fn try_from(parts: ResultParts<T>) -> CoreResult<Self> {
        let result = match parts.result {
            Some(Payload::Value(value)) => Some(value),
            Some(Payload::Null(null)) if parts.violations.is_empty() => null,
            Some(Payload::Null(_)) | None => None,
        };
        Self::new(result, parts.violations, parts.warnings)
    }
}

fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items.into_iter().map(Into::into).collect()
}

impl<T> NoThrowResult<T> {
    /// Successful result
    #[must_use]
    pub fn success(value: T) -> Self {
        Self {
            result: Some(value),
            violations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Successful result with warnings
    #[must_use]
    pub fn success_with_warnings<S: Into<String>>(
        value: T,
        warnings: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            result: Some(value),
            violations: Vec::new(),
            warnings: strings(warnings),
        }
    }

    /// Failed result with a single violation
    #[must_use]
    pub fn violation(message: impl Into<String>) -> Self {
        Self {
            result: None,
            violations: vec![message.into()],
            warnings: Vec::new(),
        }
    }

    /// Failed result
    ///
    /// # Errors
    ///
    /// Returns error if `violations` is empty
    pub fn failure<S: Into<String>, W: Into<String>>(
        violations: impl IntoIterator<Item = S>,
        warnings: impl IntoIterator<Item = W>,
    ) -> CoreResult<Self> {
        Self::new(None, violations, warnings)
    }

    /// Build a result from its parts
    ///
    /// # Errors
    ///
    /// Returns error unless exactly one of "payload present" and
    /// "violations non-empty" holds
    pub fn new<S: Into<String>, W: Into<String>>(
        result: Option<T>,
        violations: impl IntoIterator<Item = S>,
        warnings: impl IntoIterator<Item = W>,
    ) -> CoreResult<Self> {
        let violations = strings(violations);
        match (&result, violations.is_empty()) {
            (Some(_), false) => Err(CoreError::InvalidResult {
                reason: "a result cannot carry both a payload and violations".to_string(),
            }),
            (None, true) => Err(CoreError::EmptyViolations),
            _ => Ok(Self {
                result,
                violations,
                warnings: strings(warnings),
            }),
        }
    }

    /// Append a warning
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Wrap this result in an outer layer of diagnostics.
    ///
    /// This result's own violations and warnings come first, followed by the
    /// outer ones. Any outer violation turns the result into a failure.
    #[must_use]
    pub fn with_diagnostics<S: Into<String>, W: Into<String>>(
        mut self,
        violations: impl IntoIterator<Item = S>,
        warnings: impl IntoIterator<Item = W>,
    ) -> Self {
        self.violations.extend(violations.into_iter().map(Into::into));
        self.warnings.extend(warnings.into_iter().map(Into::into));
        self.collapse()
    }

    /// Put warnings raised before this result was produced ahead of its own
    #[must_use]
    pub fn with_earlier_warnings(mut self, earlier: &[String]) -> Self {
        if !earlier.is_empty() {
            let own = std::mem::take(&mut self.warnings);
            self.warnings = earlier.iter().cloned().chain(own).collect();
        }
        self
    }

    /// Normalize to the flat invariant.
    ///
    /// A result with violations never keeps a payload. Idempotent; an
    /// already-flat result passes through with diagnostics untouched.
    #[must_use]
    pub fn collapse(mut self) -> Self {
        if !self.violations.is_empty() {
            self.result = None;
        }
        self
    }

    /// Check if the transform succeeded, i.e. there are no violations
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.violations.is_empty()
    }

    /// Payload, if the transform succeeded
    #[must_use]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Reasons the transform failed
    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Non-fatal diagnostics
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consume into the payload
    #[must_use]
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// Consume into `(payload, violations, warnings)`
    #[must_use]
    pub fn into_parts(self) -> (Option<T>, Vec<String>, Vec<String>) {
        (self.result, self.violations, self.warnings)
    }

    /// Transform the payload, keeping diagnostics
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NoThrowResult<U> {
        NoThrowResult {
            result: self.result.map(f),
            violations: self.violations,
            warnings: self.warnings,
        }
    }

    /// Chain a fallible step onto a successful payload.
    ///
    /// The step's result is collapsed into this one; a failed result skips
    /// the step and keeps its diagnostics.
    #[must_use]
    pub fn and_then<U>(self, f: impl FnOnce(T) -> NoThrowResult<U>) -> NoThrowResult<U> {
        self.map(f).flatten()
    }
}

impl<T> NoThrowResult<NoThrowResult<T>> {
    /// Collapse a nested result into a flat one.
    ///
    /// Inner diagnostics precede outer diagnostics; nothing is dropped or
    /// deduplicated.
    #[must_use]
    pub fn flatten(self) -> NoThrowResult<T> {
        let Self {
            result,
            violations,
            warnings,
        } = self;
        match result {
            Some(inner) => inner.with_diagnostics(violations, warnings),
            None => NoThrowResult {
                result: None,
                violations,
                warnings,
            },
        }
    }
}

/// Successful result wrapping `value` unchanged
#[must_use]
pub fn identity_no_throw_result<T>(value: T) -> NoThrowResult<T> {
    NoThrowResult::success(value)
}

impl<T: fmt::Display> fmt::Display for NoThrowResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded() {
            write!(f, "Transform succeeded")?;
        } else {
            write!(f, "Transform failed")?;
        }
        for violation in &self.violations {
            write!(f, "\n  ❌ {}", violation)?;
        }
        for warning in &self.warnings {
            write!(f, "\n  ⚠️  {}", warning)?;
        }
        if let Some(result) = &self.result {
            write!(f, "\n  ✅ result:\n{}", result)?;
        }
        Ok(())
    }
}
