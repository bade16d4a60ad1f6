//! Field-level validation results shared by every system boundary.
//!
//! Declarative rules live on the payload types as `validator` derives; this
//! module turns their output (and any hand-written checks) into a single
//! [`ValidationFailure`] that names the first offending field's message and
//! keeps the complete field → messages map for programmatic handling.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use validator::{Validate, ValidationErrors};

/// A rejected payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    /// Message of the first violated field
    pub message: String,
    /// Every violated field with all of its messages
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationFailure {
    /// Failure with exactly one violated field.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            field_errors: BTreeMap::from([(field.to_string(), vec![message.clone()])]),
            message,
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Collects violations in the order they are discovered.
#[derive(Debug, Default)]
pub struct FieldErrors {
    order: Vec<String>,
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        if !self.errors.contains_key(field) {
            self.order.push(field.to_string());
        }
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Merge `validator` output. Fields are visited in `field_order` so the
    /// primary message is stable; unknown fields follow alphabetically.
    pub fn merge(&mut self, errors: &ValidationErrors, field_order: &[&str]) {
        let mut fields: Vec<(String, Vec<String>)> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("Invalid value ({})", e.code))
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        fields.sort_by_key(|(field, _)| {
            let rank = field_order
                .iter()
                .position(|f| *f == field.as_str())
                .unwrap_or(field_order.len());
            (rank, field.clone())
        });

        for (field, messages) in fields {
            for message in messages {
                self.add(&field, message);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_failure(self) -> Option<ValidationFailure> {
        let first = self.order.first()?;
        let message = self
            .errors
            .get(first)
            .and_then(|messages| messages.first())
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());
        Some(ValidationFailure {
            message,
            field_errors: self.errors,
        })
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        match self.into_failure() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Run `validator` rules on a value, ordering fields as given.
pub fn check<T: Validate>(value: &T, field_order: &[&str]) -> Result<(), ValidationFailure> {
    let mut errors = FieldErrors::default();
    if let Err(e) = value.validate() {
        errors.merge(&e, field_order);
    }
    errors.into_result()
}

/// Describe a JSON value's type for "expected X, got Y" messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
