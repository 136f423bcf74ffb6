//! Formula engine API.
//!
//! This module provides the pure computation half of sheetcalc:
//!
//! - [`calculate`] - Normalize, parse and evaluate an arithmetic formula
//! - [`clean_expression`] - Collapse `+`/`-` runs before parsing
//! - [`extract_references`] - Find the cell IDs a formula refers to
//! - [`substitute_references`] - Replace cell IDs with their values
//! - [`validate_raw_value`] - Reject malformed raw input
//! - [`detect_cycle`] - Circular dependency detection
//! - [`recompute_order`] - Dependency-ordered list of cells to recompute
//! - [`format_result`] - Render a result the way it is stored and returned

mod cycle;
mod deps;
mod eval;
mod format;
mod order;
mod substitute;
mod validate;

pub use cycle::detect_cycle;
pub use deps::extract_references;
pub use eval::{BinaryOp, EvalError, Expr, UnaryOp, calculate, clean_expression, evaluate, parse};
pub use format::{ERROR_RESULT, format_result};
pub use order::recompute_order;
pub use substitute::substitute_references;
pub use validate::{FORBIDDEN_SEQUENCES, InvalidInput, validate_raw_value};
