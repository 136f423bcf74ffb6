//! Reference extraction from formula strings.
//!
//! Scans formula text for identifiers that name other cells (e.g. `cell1`,
//! `x_total`). The result is used to fetch dependency values and to record
//! dependency edges for propagation and cycle detection.
//!
//! Handles:
//! - Plain identifiers: `a`, `cell1`, `1x`
//! - Ignores integers and the pieces of decimal/scientific literals
//!   (`12`, `1e5`, the `5e` in `1.5e+3`)
//! - Ignores fragments whose first occurrence sits inside a longer word

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Extract the set of cell IDs referenced by a (lowercased) formula.
pub fn extract_references(formula: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();

    for m in word_re().find_iter(formula) {
        let token = m.as_str();
        if refs.contains(token) {
            continue;
        }

        // Only the first occurrence decides whether the token stands on its own.
        let first = formula.find(token).unwrap_or(m.start());
        if let Some(prev) = formula[..first].chars().next_back() {
            if prev.is_alphanumeric() || prev == '.' {
                continue;
            }
        }

        if is_numeric_literal(token) {
            continue;
        }
        refs.insert(token.to_string());
    }

    refs
}

/// Maximal runs of word characters.
fn word_re() -> &'static Regex {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    WORD_RE.get_or_init(|| {
        Regex::new(r"[0-9A-Za-z_]+").expect("reference word regex must compile")
    })
}

/// Mantissa left over when a signed exponent splits a literal: `1e` in `1e+5`.
fn mantissa_re() -> &'static Regex {
    static MANTISSA_RE: OnceLock<Regex> = OnceLock::new();
    MANTISSA_RE.get_or_init(|| {
        Regex::new(r"^[0-9]+[eE][0-9]*$").expect("mantissa regex must compile")
    })
}

fn is_numeric_literal(token: &str) -> bool {
    if !token.starts_with(|c: char| c.is_ascii_digit()) {
        // "inf" and "nan" parse as floats but are valid cell names.
        return false;
    }
    token.parse::<i64>().is_ok() || token.parse::<f64>().is_ok() || mantissa_re().is_match(token)
}
