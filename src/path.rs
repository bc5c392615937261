//! Canonical path derivation.
//!
//! A node's path is the `/`-joined chain of names from its root down to and
//! including itself. Paths are derived state: any rename or move must refresh
//! the path of the touched node and of every node below it.

use crate::node::{Node, NodeId};

pub const SEPARATOR: char = '/';

/// Canonical path of `node` given its ancestor chain, root first.
///
/// This is the reference form. The stored `path` maintained incrementally by
/// [`child_path`] and [`refresh_subtree`] must always equal it.
pub fn resolve_path(node: &Node, ancestors: &[&Node]) -> String {
    let capacity = ancestors.iter().map(|a| a.name.len() + 1).sum::<usize>() + node.name.len();
    let mut path = String::with_capacity(capacity);
    for ancestor in ancestors {
        path.push_str(&ancestor.name);
        path.push(SEPARATOR);
    }
    path.push_str(&node.name);
    path
}

/// Path of a child called `name` under a parent path (`None` means root level)
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}{}{}", parent, SEPARATOR, name),
        None => name.to_string(),
    }
}

/// Recompute the path of `node` and all of its descendants.
///
/// Every recomputed `(id, path)` pair is appended to `recomputed` in
/// depth-first order, parents before children.
pub fn refresh_subtree(
    node: &mut Node,
    parent_path: Option<&str>,
    recomputed: &mut Vec<(NodeId, String)>,
) {
    node.path = child_path(parent_path, &node.name);
    recomputed.push((node.id, node.path.clone()));

    let path = node.path.clone();
    if let Some(children) = node.children_mut() {
        for child in children {
            refresh_subtree(child, Some(&path), recomputed);
        }
    }
}

/// Recompute paths for a whole sequence of siblings
pub fn refresh_all(nodes: &mut [Node], parent_path: Option<&str>) -> usize {
    let mut recomputed = Vec::new();
    for node in nodes {
        refresh_subtree(node, parent_path, &mut recomputed);
    }
    recomputed.len()
}
