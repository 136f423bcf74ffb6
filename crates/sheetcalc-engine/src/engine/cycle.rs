//! Circular dependency detection for formula cells.
//!
//! When a formula is written, we must verify it doesn't close a cycle
//! (e.g., `a` references `b`, `b` references `c`, `c` references `a`).
//! This module walks the stored dependency edges depth-first, starting from
//! the cells the new formula references, before the write happens.

use std::collections::{BTreeSet, HashSet};

/// Detect whether writing `cell` with `references` would create a cycle.
///
/// `dependencies_of` returns the stored dependencies of a cell. Returns
/// `Some(path)` (starting and ending with `cell`) if a cycle is found.
pub fn detect_cycle<E, F>(
    cell: &str,
    references: &BTreeSet<String>,
    mut dependencies_of: F,
) -> Result<Option<Vec<String>>, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    let mut explored = HashSet::new();
    let mut path = vec![cell.to_string()];

    for reference in references {
        if detect_cycle_dfs(cell, reference, &mut dependencies_of, &mut explored, &mut path)? {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn detect_cycle_dfs<E, F>(
    target: &str,
    current: &str,
    dependencies_of: &mut F,
    explored: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<bool, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    path.push(current.to_string());
    if current == target {
        return Ok(true);
    }
    if !explored.insert(current.to_string()) {
        path.pop();
        return Ok(false);
    }

    for dep in dependencies_of(current)? {
        if detect_cycle_dfs(target, &dep, dependencies_of, explored, path)? {
            return Ok(true);
        }
    }

    path.pop();
    Ok(false)
}
