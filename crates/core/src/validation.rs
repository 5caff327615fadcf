//! Input validation shared by every flow step.
//!
//! All helpers are pure: they never touch the session, so a rejected input
//! leaves the conversation exactly where it was.

use crate::domain::catalog::LabelLookup;
use crate::errors::DomainError;

const CANCEL_TOKENS: &[&str] = &["cancel", "🔴 cancel", "/cancel"];
const SKIP_TOKENS: &[&str] = &["skip"];
const YES_TOKENS: &[&str] = &["yes", "y", "sí", "si"];
const NO_TOKENS: &[&str] = &["no", "n"];

/// Parses a free-text measurement, accepting a decimal comma.
pub fn parse_measurement(input: &str) -> Result<f64, DomainError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyInput);
    }

    let normalized = trimmed.replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(DomainError::InvalidNumber { input: trimmed.to_owned() }),
    }
}

pub fn resolve_label<T: Clone>(lookup: &LabelLookup<T>, input: &str) -> Result<T, DomainError> {
    lookup
        .resolve(input)
        .cloned()
        .ok_or_else(|| DomainError::UnknownLabel { input: input.trim().to_owned() })
}

/// Only explicit answers are accepted; anything else is reported so the
/// caller can ask again instead of recording a silent "no".
pub fn parse_yes_no(input: &str) -> Result<bool, DomainError> {
    let normalized = normalize_keyword(input);
    if YES_TOKENS.contains(&normalized.as_str()) {
        return Ok(true);
    }
    if NO_TOKENS.contains(&normalized.as_str()) {
        return Ok(false);
    }
    Err(DomainError::InvalidAnswer { input: input.trim().to_owned() })
}

pub fn is_cancel(input: &str) -> bool {
    CANCEL_TOKENS.contains(&normalize_keyword(input).as_str())
}

pub fn is_skip(input: &str) -> bool {
    SKIP_TOKENS.contains(&normalize_keyword(input).as_str())
}

pub fn normalize_keyword(input: &str) -> String {
    input.trim().to_lowercase()
}
