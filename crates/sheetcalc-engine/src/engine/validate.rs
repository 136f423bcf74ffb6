//! Raw input validation.
//!
//! A raw cell value is accepted when it is a number or a formula starting
//! with `=`, and it does not contain a doubled operator.

use thiserror::Error;

/// Operator pairs that are never valid in raw input.
pub const FORBIDDEN_SEQUENCES: [&str; 4] = ["++", "--", "//", "**"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("value {0:?} is neither a number nor a formula starting with '='")]
    NotNumberOrFormula(String),

    #[error("value contains forbidden sequence {0:?}")]
    ForbiddenSequence(&'static str),
}

/// Check a raw value before any extraction or evaluation happens.
pub fn validate_raw_value(raw: &str) -> Result<(), InvalidInput> {
    if raw.parse::<f64>().is_err() && !raw.starts_with('=') {
        return Err(InvalidInput::NotNumberOrFormula(raw.to_string()));
    }
    if let Some(seq) = FORBIDDEN_SEQUENCES.into_iter().find(|seq| raw.contains(*seq)) {
        return Err(InvalidInput::ForbiddenSequence(seq));
    }
    Ok(())
}
