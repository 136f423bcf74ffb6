//! Error types for sheetcalc core.

use thiserror::Error;

use sheetcalc_engine::engine::{EvalError, InvalidInput};

/// Errors that can occur while reading or writing cells.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("invalid input: {0}")]
    Validation(#[from] InvalidInput),

    #[error("cell {0} can't reference itself")]
    SelfReference(String),

    #[error("circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("{0}")]
    Arithmetic(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EvalError> for SheetError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Parse { position, message } => SheetError::Parse { position, message },
            EvalError::Arithmetic(message) => SheetError::Arithmetic(message),
        }
    }
}

impl SheetError {
    /// Short machine-readable error class.
    pub fn code(&self) -> &'static str {
        match self {
            SheetError::Validation(_) => "validation",
            SheetError::SelfReference(_) => "self_reference",
            SheetError::CircularDependency(_) => "cycle",
            SheetError::Parse { .. } => "parse",
            SheetError::Arithmetic(_) => "arithmetic",
            SheetError::NotFound(_) => "not_found",
            SheetError::Sqlite(_) | SheetError::Storage(_) | SheetError::Io(_) => "storage",
        }
    }

    /// Whether the error was caused by the submitted value rather than the store.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SheetError::Validation(_)
                | SheetError::SelfReference(_)
                | SheetError::CircularDependency(_)
                | SheetError::Parse { .. }
                | SheetError::Arithmetic(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_errors_map_to_sheet_errors() {
        let parse: SheetError = EvalError::Parse {
            position: 3,
            message: "unexpected identifier 'x'".to_string(),
        }
        .into();
        assert_eq!(parse.code(), "parse");
        assert_eq!(parse.to_string(), "parse error at 3: unexpected identifier 'x'");

        let arith: SheetError = EvalError::Arithmetic("division by zero".to_string()).into();
        assert_eq!(arith.code(), "arithmetic");
        assert_eq!(arith.to_string(), "division by zero");
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = SheetError::CircularDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> a");
        assert!(err.is_input_error());
        assert!(!SheetError::NotFound("cell a/b".into()).is_input_error());
    }
}
