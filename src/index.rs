//! Id lookup over a whole forest.
//!
//! The index records, for every node, its parent and its slot among its
//! siblings. It holds no references into the forest, so it is rebuilt from the
//! committed forest after every mutation and can never hand out stale nodes.

use crate::error::TreeError;
use crate::forest::Forest;
use crate::node::{Node, NodeId};
use std::collections::HashMap;

/// Where a node sits in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub parent: Option<NodeId>,
    pub slot: usize,
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: HashMap<NodeId, Location>,
}

impl TreeIndex {
    /// Index every node of `forest`. Fails if an id appears twice.
    pub fn build(forest: &Forest) -> Result<Self, TreeError> {
        let mut index = Self {
            entries: HashMap::with_capacity(forest.len()),
        };
        index.index_nodes(forest.roots(), None, 0)?;
        Ok(index)
    }

    fn index_nodes(
        &mut self,
        nodes: &[Node],
        parent: Option<NodeId>,
        depth: usize,
    ) -> Result<(), TreeError> {
        for (slot, node) in nodes.iter().enumerate() {
            let location = Location {
                parent,
                slot,
                depth,
            };
            if self.entries.insert(node.id, location).is_some() {
                return Err(TreeError::DuplicateId { id: node.id });
            }
            self.index_nodes(node.children(), Some(node.id), depth + 1)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn locate(&self, id: NodeId) -> Result<Location, TreeError> {
        self.entries
            .get(&id)
            .copied()
            .ok_or(TreeError::NotFound { id })
    }

    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.locate(id)?.parent)
    }

    /// Ancestor ids of `id`, root first, excluding `id` itself
    pub fn ancestors_of(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut ancestors = Vec::new();
        let mut current = self.locate(id)?.parent;
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.locate(parent)?.parent;
        }
        ancestors.reverse();
        Ok(ancestors)
    }

    /// Sibling slots from the root level down to `id` itself
    pub fn route(&self, id: NodeId) -> Result<Vec<usize>, TreeError> {
        let mut location = self.locate(id)?;
        let mut route = Vec::with_capacity(location.depth + 1);
        route.push(location.slot);
        while let Some(parent) = location.parent {
            location = self.locate(parent)?;
            route.push(location.slot);
        }
        route.reverse();
        Ok(route)
    }

    /// True if `id` lies strictly below `ancestor`
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.entries.get(&id).and_then(|loc| loc.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.entries.get(&parent).and_then(|loc| loc.parent);
        }
        false
    }

    /// Resolve `id` to its node in `forest`, which must be the forest this
    /// index was built from
    pub fn find_by_id<'f>(&self, forest: &'f Forest, id: NodeId) -> Result<&'f Node, TreeError> {
        let route = self.route(id)?;
        forest
            .node_at(&route)
            .filter(|node| node.id == id)
            .ok_or(TreeError::NotFound { id })
    }

    /// Ancestor nodes of `id`, root first
    pub fn ancestor_nodes<'f>(
        &self,
        forest: &'f Forest,
        id: NodeId,
    ) -> Result<Vec<&'f Node>, TreeError> {
        self.ancestors_of(id)?
            .into_iter()
            .map(|ancestor| self.find_by_id(forest, ancestor))
            .collect()
    }
}
