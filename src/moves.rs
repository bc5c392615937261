//! Reparent planning.
//!
//! Moving a node never creates or destroys nodes. It changes one parent link
//! and rewrites the path of the moved node and of everything below it, which
//! makes a move cost proportional to the size of the moved subtree.

use crate::node::{Node, NodeId};
use crate::path;

/// A detached subtree with its paths already rewritten for its destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub subtree: Node,
    /// `(id, new path)` for the moved node and each descendant, depth-first
    pub recomputed: Vec<(NodeId, String)>,
}

impl MovePlan {
    pub fn len(&self) -> usize {
        self.recomputed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recomputed.is_empty()
    }
}

/// Plan moving `node` under a parent whose path is `new_parent_path`
/// (`None` for the root level).
pub fn plan_move(mut node: Node, new_parent_path: Option<&str>) -> MovePlan {
    let mut recomputed = Vec::with_capacity(1 + node.descendant_count());
    path::refresh_subtree(&mut node, new_parent_path, &mut recomputed);
    log::debug!(
        "plan_move: {} now at '{}', {} paths recomputed",
        node.id,
        node.path,
        recomputed.len()
    );
    MovePlan {
        subtree: node,
        recomputed,
    }
}

/// Shift a route computed before the node at `removed` was detached so that
/// it still addresses the same node afterwards.
pub(crate) fn adjust_route_after_detach(route: &mut [usize], removed: &[usize]) {
    let Some((&removed_slot, removed_parent)) = removed.split_last() else {
        return;
    };
    let level = removed_parent.len();
    if route.len() > level && route[..level] == *removed_parent && route[level] > removed_slot {
        route[level] -= 1;
    }
}
