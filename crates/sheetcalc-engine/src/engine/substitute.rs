//! Textual substitution of cell references with their values.

use std::collections::HashMap;

/// Replace every occurrence of each referenced cell ID with its value.
///
/// Longer IDs are replaced first so `x1` is never mangled by a shorter `x`.
/// IDs missing from `values` stay in the text and fail later at parse time.
pub fn substitute_references(formula: &str, values: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = values.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = formula.to_string();
    for key in keys {
        out = out.replace(key.as_str(), &values[key]);
    }
    out
}
