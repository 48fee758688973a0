//! Per-field validation rules.
//!
//! Each rule returns the violations for one field; callers compose rules by
//! extending one `Vec` and hand it to `ensure_valid`.

use crate::model::member::ProjectRole;
use crate::model::task::AssignmentRole;
use crate::validation::{FieldViolation, ViolationCode};
use once_cell::sync::Lazy;
use regex::Regex;

pub const PROJECT_NAME_MAX: usize = 100;
pub const LANE_NAME_MAX: usize = 50;
pub const COLUMN_NAME_MAX: usize = 50;
pub const TASK_TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 4000;
pub const NOTE_BODY_MAX: usize = 4000;
pub const DISPLAY_NAME_MAX: usize = 80;
pub const EMAIL_MAX: usize = 254;
pub const WIP_LIMIT_MAX: i64 = 999;

static CONSECUTIVE_WS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Trims surrounding whitespace from single-line names.
pub fn normalize_name(value: &str) -> String {
    value.trim().to_string()
}

/// Trims optional free text and folds blank input to `None`.
pub fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Single-line name: required, no consecutive whitespace, bounded length.
pub fn name(field: &'static str, value: &str, max_chars: usize) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if value.trim().is_empty() {
        violations.push(FieldViolation::new(
            field,
            ViolationCode::Required,
            "must not be blank",
        ));
        return violations;
    }
    if CONSECUTIVE_WS_RE.is_match(value) {
        violations.push(FieldViolation::new(
            field,
            ViolationCode::ConsecutiveWhitespace,
            "must not contain consecutive whitespace",
        ));
    }
    violations.extend(max_length(field, value, max_chars));
    violations
}

/// Multi-line body: required, bounded length.
pub fn body(field: &'static str, value: &str, max_chars: usize) -> Vec<FieldViolation> {
    if value.trim().is_empty() {
        return vec![FieldViolation::new(
            field,
            ViolationCode::Required,
            "must not be blank",
        )];
    }
    max_length(field, value, max_chars)
}

/// Optional free text: bounded length when present.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> Vec<FieldViolation> {
    match value {
        Some(text) => max_length(field, text, max_chars),
        None => Vec::new(),
    }
}

/// Order keys are non-negative.
pub fn sort_order(field: &'static str, value: i64) -> Vec<FieldViolation> {
    if value < 0 {
        return vec![FieldViolation::new(
            field,
            ViolationCode::Negative,
            format!("must be >= 0, got {value}"),
        )];
    }
    Vec::new()
}

/// Optional WIP cap: when set, `1..=WIP_LIMIT_MAX`.
pub fn wip_limit(field: &'static str, value: Option<i64>) -> Vec<FieldViolation> {
    match value {
        Some(limit) if !(1..=WIP_LIMIT_MAX).contains(&limit) => vec![FieldViolation::new(
            field,
            ViolationCode::OutOfRange,
            format!("must be between 1 and {WIP_LIMIT_MAX}, got {limit}"),
        )],
        _ => Vec::new(),
    }
}

/// Login email shape check.
pub fn email(field: &'static str, value: &str) -> Vec<FieldViolation> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return vec![FieldViolation::new(
            field,
            ViolationCode::Required,
            "must not be blank",
        )];
    }
    let mut violations = max_length(field, trimmed, EMAIL_MAX);
    if !EMAIL_RE.is_match(trimmed) {
        violations.push(FieldViolation::new(
            field,
            ViolationCode::InvalidFormat,
            "must look like name@domain.tld",
        ));
    }
    violations
}

/// Parses a project role name, rejecting undefined values.
pub fn project_role(field: &'static str, value: &str) -> Result<ProjectRole, FieldViolation> {
    ProjectRole::parse(value).ok_or_else(|| unknown_value(field, value))
}

/// Parses an assignment role name, rejecting undefined values.
pub fn assignment_role(
    field: &'static str,
    value: &str,
) -> Result<AssignmentRole, FieldViolation> {
    AssignmentRole::parse(value).ok_or_else(|| unknown_value(field, value))
}

fn unknown_value(field: &'static str, value: &str) -> FieldViolation {
    FieldViolation::new(
        field,
        ViolationCode::UnknownValue,
        format!("`{}` is not a defined value", value.trim()),
    )
}

fn max_length(field: &'static str, value: &str, max_chars: usize) -> Vec<FieldViolation> {
    let count = value.chars().count();
    if count > max_chars {
        return vec![FieldViolation::new(
            field,
            ViolationCode::TooLong,
            format!("must be at most {max_chars} characters, got {count}"),
        )];
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::{email, name, sort_order, wip_limit};
    use crate::validation::ViolationCode;

    #[test]
    fn blank_name_reports_required_only() {
        let violations = name("name", "   ", 10);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, ViolationCode::Required);
    }

    #[test]
    fn name_reports_whitespace_and_length_together() {
        let violations = name("name", "a  very long name", 5);
        let codes: Vec<_> = violations.iter().map(|v| v.code).collect();
        assert_eq!(
            codes,
            vec![ViolationCode::ConsecutiveWhitespace, ViolationCode::TooLong]
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(name("name", "ééééé", 5).is_empty());
    }

    #[test]
    fn numeric_rules_check_bounds() {
        assert!(sort_order("sort_order", 0).is_empty());
        assert_eq!(sort_order("sort_order", -1)[0].code, ViolationCode::Negative);
        assert!(wip_limit("wip_limit", None).is_empty());
        assert_eq!(wip_limit("wip_limit", Some(0))[0].code, ViolationCode::OutOfRange);
    }

    #[test]
    fn email_requires_at_and_domain() {
        assert!(email("email", "ada@example.com").is_empty());
        assert_eq!(email("email", "ada")[0].code, ViolationCode::InvalidFormat);
    }
}
