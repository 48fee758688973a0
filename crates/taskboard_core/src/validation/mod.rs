//! Input validation for write operations.
//!
//! # Responsibility
//! - Report field-level violations for caller input before storage access.
//! - Keep rules as plain functions composed by concatenating their output.
//!
//! # Invariants
//! - Rules never touch storage and never mutate their input.
//! - An empty violation list means the input is accepted.

pub mod rules;

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Machine-readable reason for one violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Required,
    ConsecutiveWhitespace,
    TooLong,
    Negative,
    OutOfRange,
    InvalidFormat,
    UnknownValue,
}

impl ViolationCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::ConsecutiveWhitespace => "consecutive_whitespace",
            Self::TooLong => "too_long",
            Self::Negative => "negative",
            Self::OutOfRange => "out_of_range",
            Self::InvalidFormat => "invalid_format",
            Self::UnknownValue => "unknown_value",
        }
    }
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub code: ViolationCode,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            field,
            code,
            message: message.into(),
        }
    }
}

/// Non-empty set of violations for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    /// Whether any violation targets `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Whether `field` was rejected with `code`.
    pub fn has(&self, field: &str, code: ViolationCode) -> bool {
        self.violations
            .iter()
            .any(|v| v.field == field && v.code == code)
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed:")?;
        for violation in &self.violations {
            write!(
                f,
                " {}={}",
                violation.field,
                violation.code.as_str()
            )?;
        }
        Ok(())
    }
}

impl Error for ValidationErrors {}

impl From<FieldViolation> for ValidationErrors {
    fn from(value: FieldViolation) -> Self {
        Self {
            violations: vec![value],
        }
    }
}

/// Turns collected violations into a result.
pub fn ensure_valid(violations: Vec<FieldViolation>) -> Result<(), ValidationErrors> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { violations })
    }
}
