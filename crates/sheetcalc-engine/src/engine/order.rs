//! Recompute ordering for dependents of a changed cell.
//!
//! Every cell that transitively depends on the changed cell is listed once,
//! after all of the cells it depends on within that set, so a single pass
//! over the list sees fresh values everywhere.

use std::collections::HashSet;

/// Collect the transitive dependents of `changed` in recompute order.
///
/// `dependents_of` returns the cells whose formulas reference a cell.
/// `changed` itself is not part of the result. A visited set keeps the walk
/// finite even if the stored graph contains a cycle.
pub fn recompute_order<E, F>(changed: &str, mut dependents_of: F) -> Result<Vec<String>, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    let mut visited: HashSet<String> = HashSet::from([changed.to_string()]);
    let mut post_order = Vec::new();
    let mut stack = vec![(changed.to_string(), dependents_of(changed)?.into_iter())];

    // Iterative DFS; a cell is finished once all of its dependents are.
    while let Some((_, children)) = stack.last_mut() {
        match children.next() {
            Some(child) => {
                if visited.insert(child.clone()) {
                    let grandchildren = dependents_of(&child)?.into_iter();
                    stack.push((child, grandchildren));
                }
            }
            None => {
                if let Some((cell, _)) = stack.pop() {
                    post_order.push(cell);
                }
            }
        }
    }

    // The changed cell finishes last.
    post_order.pop();
    post_order.reverse();
    Ok(post_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;

    fn order(edges: &[(&str, &[&str])], changed: &str) -> Vec<String> {
        let g: HashMap<String, Vec<String>> = edges
            .iter()
            .map(|(k, deps)| (k.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect();
        recompute_order::<Infallible, _>(changed, |c| Ok(g.get(c).cloned().unwrap_or_default()))
            .unwrap()
    }

    fn position(list: &[String], cell: &str) -> usize {
        list.iter().position(|c| c == cell).unwrap()
    }

    #[test]
    fn test_no_dependents() {
        assert!(order(&[], "a").is_empty());
    }

    #[test]
    fn test_chain() {
        assert_eq!(
            order(&[("a", &["b"]), ("b", &["c"])], "a"),
            vec!["b", "c"]
        );
    }

    #[test]
    fn test_diamond_lists_each_cell_once_after_its_inputs() {
        // c1 -> {c2, c3}, c2 -> {c3}
        let list = order(&[("c1", &["c3", "c2"]), ("c2", &["c3"])], "c1");
        assert_eq!(list.len(), 2);
        assert!(position(&list, "c2") < position(&list, "c3"));
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        let list = order(&[("a", &["b"]), ("b", &["c"]), ("c", &["b", "a"])], "a");
        assert_eq!(list.len(), 2);
        assert!(!list.contains(&"a".to_string()));
    }
}
