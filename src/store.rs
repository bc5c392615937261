//! The authoritative workspace tree.
//!
//! `TreeStore` is the only component that mutates a [`Forest`]. Each
//! operation validates against the committed forest first, then applies the
//! change to a private copy and swaps it in. A rejected operation therefore
//! never leaves a trace, and snapshots handed to observers are never mutated
//! after the fact.

use crate::error::{TargetViolation, TreeError};
use crate::forest::Forest;
use crate::guard::{has_name_collision, is_valid_name};
use crate::index::TreeIndex;
use crate::intent::{MutationIntent, Operation, Origin};
use crate::moves::{adjust_route_after_detach, plan_move};
use crate::node::{Kind, Node, NodeId};
use crate::path;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// A committed change to the forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mutation", rename_all = "lowercase")]
pub enum Mutation {
    Created {
        id: NodeId,
        parent_id: Option<NodeId>,
        kind: Kind,
        name: String,
    },
    Renamed {
        id: NodeId,
        from: String,
        to: String,
    },
    Removed {
        id: NodeId,
        parent_id: Option<NodeId>,
        /// Nodes deleted, the target included
        removed: usize,
    },
    Moved {
        id: NodeId,
        from_parent: Option<NodeId>,
        to_parent: Option<NodeId>,
        /// Paths rewritten, the moved node included
        recomputed: usize,
    },
}

impl Mutation {
    pub fn id(&self) -> NodeId {
        match self {
            Mutation::Created { id, .. }
            | Mutation::Renamed { id, .. }
            | Mutation::Removed { id, .. }
            | Mutation::Moved { id, .. } => *id,
        }
    }

    /// The operation that reproduces this mutation on another replica
    pub fn to_operation(&self) -> Operation {
        match self {
            Mutation::Created {
                id,
                parent_id,
                kind,
                name,
            } => Operation::Create {
                id: Some(*id),
                parent_id: *parent_id,
                kind: *kind,
                name: (!name.is_empty()).then(|| name.clone()),
            },
            Mutation::Renamed { id, to, .. } => Operation::Rename {
                target_id: *id,
                name: to.clone(),
            },
            Mutation::Removed { id, .. } => Operation::Remove { target_id: *id },
            Mutation::Moved { id, to_parent, .. } => Operation::Move {
                target_id: *id,
                new_parent_id: *to_parent,
            },
        }
    }
}

/// Result of an accepted operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Committed(Mutation),
    /// Accepted but nothing changed (empty rename, move to current parent)
    Unchanged,
}

impl Applied {
    pub fn mutation(&self) -> Option<&Mutation> {
        match self {
            Applied::Committed(mutation) => Some(mutation),
            Applied::Unchanged => None,
        }
    }
}

/// Notification sent to observers after every commit
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub revision: u64,
    pub origin: Origin,
    pub mutation: Mutation,
    pub committed_at: DateTime<Utc>,
    pub snapshot: Arc<Forest>,
}

/// Receives one call per committed mutation, never for rejected ones
pub trait ForestObserver: Send {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ForestObserver for F
where
    F: Fn(&ChangeEvent) + Send,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct TreeStore {
    forest: Arc<Forest>,
    index: TreeIndex,
    revision: u64,
    observers: Vec<(ObserverId, Box<dyn ForestObserver>)>,
    next_observer_id: u64,
}

impl fmt::Debug for TreeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeStore")
            .field("nodes", &self.index.len())
            .field("revision", &self.revision)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Create a store over an empty forest
    pub fn new() -> Self {
        Self {
            forest: Arc::new(Forest::new()),
            index: TreeIndex::default(),
            revision: 0,
            observers: Vec::new(),
            next_observer_id: 0,
        }
    }

    /// Adopt an existing forest after checking id and sibling-name uniqueness
    pub fn from_forest(forest: Forest) -> TreeResult<Self> {
        forest.validate()?;
        let index = TreeIndex::build(&forest)?;
        Ok(Self {
            forest: Arc::new(forest),
            index,
            ..Self::new()
        })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Shared handle to the committed forest; it never changes underneath
    /// the holder
    pub fn snapshot(&self) -> Arc<Forest> {
        Arc::clone(&self.forest)
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    /// Number of commits so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains(id)
    }

    pub fn get(&self, id: NodeId) -> TreeResult<&Node> {
        self.index.find_by_id(&self.forest, id)
    }

    pub fn parent_of(&self, id: NodeId) -> TreeResult<Option<NodeId>> {
        self.index.parent_of(id)
    }

    /// Ancestor nodes of `id`, root first
    pub fn ancestors(&self, id: NodeId) -> TreeResult<Vec<&Node>> {
        self.index.ancestor_nodes(&self.forest, id)
    }

    /// Path of `id` derived from scratch through its ancestor chain
    pub fn resolve_path(&self, id: NodeId) -> TreeResult<String> {
        let node = self.get(id)?;
        let ancestors = self.ancestors(id)?;
        Ok(path::resolve_path(node, &ancestors))
    }

    /// Children of `parent`, or the root sequence when `parent` is `None`
    pub fn children(&self, parent: Option<NodeId>) -> TreeResult<&[Node]> {
        match parent {
            None => Ok(self.forest.roots()),
            Some(id) => Ok(self.get(id)?.children()),
        }
    }

    pub fn find_by_path(&self, path: &str) -> Option<&Node> {
        self.forest.find_by_path(path)
    }

    /// Register an observer
    pub fn subscribe<O>(&mut self, observer: O) -> ObserverId
    where
        O: ForestObserver + 'static,
    {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Create a provisional (unnamed) node as the last child of `parent`
    pub fn create(&mut self, parent: Option<NodeId>, kind: Kind) -> TreeResult<NodeId> {
        let result = self.create_node(Origin::Local, None, parent, kind, None);
        log_rejection("create", result).map(|mutation| mutation.id())
    }

    /// Create and name a node in one commit
    pub fn create_named(
        &mut self,
        parent: Option<NodeId>,
        kind: Kind,
        name: &str,
    ) -> TreeResult<NodeId> {
        let result = self.create_node(Origin::Local, None, parent, kind, Some(name));
        log_rejection("create", result).map(|mutation| mutation.id())
    }

    /// Rename a node. An empty name cancels the edit.
    pub fn rename(&mut self, id: NodeId, name: &str) -> TreeResult<Applied> {
        log_rejection("rename", self.rename_node(Origin::Local, id, name))
    }

    /// Delete a node with its whole subtree, returning what was removed
    pub fn remove(&mut self, id: NodeId) -> TreeResult<Node> {
        log_rejection("remove", self.remove_node(Origin::Local, id)).map(|(node, _)| node)
    }

    /// Reparent the subtree rooted at `id` under `new_parent` (root when `None`)
    pub fn move_node(&mut self, id: NodeId, new_parent: Option<NodeId>) -> TreeResult<Applied> {
        log_rejection("move", self.move_subtree(Origin::Local, id, new_parent))
    }

    /// Apply a mutation intent, local or remote alike
    pub fn apply(&mut self, intent: &MutationIntent) -> TreeResult<Applied> {
        let origin = intent.origin;
        let result = match &intent.operation {
            Operation::Create {
                id,
                parent_id,
                kind,
                name,
            } => self
                .create_node(origin, *id, *parent_id, *kind, name.as_deref())
                .map(Applied::Committed),
            Operation::Rename { target_id, name } => self.rename_node(origin, *target_id, name),
            Operation::Remove { target_id } => self
                .remove_node(origin, *target_id)
                .map(|(_, mutation)| Applied::Committed(mutation)),
            Operation::Move {
                target_id,
                new_parent_id,
            } => self.move_subtree(origin, *target_id, *new_parent_id),
        };
        log_rejection(intent.operation.name(), result)
    }

    /// Flip a folder's open/closed state. Returns the new state; files are
    /// left alone and report `false`. This is view state: no commit, no
    /// notification.
    pub fn toggle_expanded(&mut self, id: NodeId) -> TreeResult<bool> {
        let expanded = !self.get(id)?.is_expanded();
        self.set_expanded(id, expanded)
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> TreeResult<bool> {
        let route = self.index.route(id)?;
        let node = Arc::make_mut(&mut self.forest)
            .node_at_mut(&route)
            .ok_or(TreeError::NotFound { id })?;
        Ok(node.set_expanded(expanded) && expanded)
    }

    fn path_of_parent(&self, parent: Option<NodeId>) -> TreeResult<Option<String>> {
        match parent {
            None => Ok(None),
            Some(id) => Ok(Some(self.get(id)?.path.clone())),
        }
    }

    fn route_of_parent(&self, parent: Option<NodeId>) -> TreeResult<Vec<usize>> {
        match parent {
            None => Ok(Vec::new()),
            Some(id) => self.index.route(id),
        }
    }

    fn create_node(
        &mut self,
        origin: Origin,
        id: Option<NodeId>,
        parent: Option<NodeId>,
        kind: Kind,
        name: Option<&str>,
    ) -> TreeResult<Mutation> {
        let id = match id {
            Some(id) if self.index.contains(id) => return Err(TreeError::DuplicateId { id }),
            Some(id) => id,
            None => NodeId::generate(),
        };

        if let Some(parent_id) = parent {
            if self.get(parent_id)?.is_file() {
                return Err(TreeError::InvalidParent { id: parent_id });
            }
        }

        let name = name.unwrap_or_default();
        if !is_valid_name(name) {
            return Err(TreeError::InvalidName {
                name: name.to_string(),
            });
        }
        if has_name_collision(self.children(parent)?, name, None) {
            return Err(TreeError::DuplicateName {
                name: name.to_string(),
            });
        }

        let parent_path = self.path_of_parent(parent)?;
        let parent_route = self.route_of_parent(parent)?;

        let mut node = Node::with_id(id, name, kind);
        node.path = path::child_path(parent_path.as_deref(), name);

        let mut next = Forest::clone(&self.forest);
        next.siblings_mut(&parent_route)
            .ok_or(TreeError::NotFound {
                id: parent.unwrap_or(id),
            })?
            .push(node);

        let mutation = Mutation::Created {
            id,
            parent_id: parent,
            kind,
            name: name.to_string(),
        };
        self.commit(next, origin, mutation.clone())?;
        Ok(mutation)
    }

    fn rename_node(&mut self, origin: Origin, id: NodeId, name: &str) -> TreeResult<Applied> {
        let current = self.get(id)?;
        if name.is_empty() || current.name == name {
            log::debug!("TreeStore::rename: {} unchanged", id);
            return Ok(Applied::Unchanged);
        }
        if !is_valid_name(name) {
            return Err(TreeError::InvalidName {
                name: name.to_string(),
            });
        }

        let parent = self.index.parent_of(id)?;
        if has_name_collision(self.children(parent)?, name, Some(id)) {
            return Err(TreeError::DuplicateName {
                name: name.to_string(),
            });
        }

        let parent_path = self.path_of_parent(parent)?;
        let route = self.index.route(id)?;

        let mut next = Forest::clone(&self.forest);
        let node = next.node_at_mut(&route).ok_or(TreeError::NotFound { id })?;
        let from = std::mem::replace(&mut node.name, name.to_string());
        let mut recomputed = Vec::new();
        path::refresh_subtree(node, parent_path.as_deref(), &mut recomputed);
        log::debug!(
            "TreeStore::rename: '{}' -> '{}', {} paths recomputed",
            from,
            name,
            recomputed.len()
        );

        let mutation = Mutation::Renamed {
            id,
            from,
            to: name.to_string(),
        };
        self.commit(next, origin, mutation.clone())?;
        Ok(Applied::Committed(mutation))
    }

    fn remove_node(&mut self, origin: Origin, id: NodeId) -> TreeResult<(Node, Mutation)> {
        let route = self.index.route(id)?;
        let parent = self.index.parent_of(id)?;
        let (&slot, parent_route) = route.split_last().ok_or(TreeError::NotFound { id })?;

        let mut next = Forest::clone(&self.forest);
        let siblings = next
            .siblings_mut(parent_route)
            .filter(|siblings| slot < siblings.len())
            .ok_or(TreeError::NotFound { id })?;
        let removed = siblings.remove(slot);

        let mutation = Mutation::Removed {
            id,
            parent_id: parent,
            removed: 1 + removed.descendant_count(),
        };
        self.commit(next, origin, mutation.clone())?;
        Ok((removed, mutation))
    }

    fn move_subtree(
        &mut self,
        origin: Origin,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> TreeResult<Applied> {
        let node = self.get(id)?;
        let name = node.name.clone();

        if let Some(target) = new_parent {
            let violation = if target == id {
                Some(TargetViolation::SelfTarget)
            } else if self.get(target)?.is_file() {
                Some(TargetViolation::FileTarget)
            } else if self.index.is_descendant_of(target, id) {
                Some(TargetViolation::DescendantTarget)
            } else {
                None
            };
            if let Some(violation) = violation {
                return Err(TreeError::InvalidTarget {
                    id,
                    target,
                    violation,
                });
            }
        }

        let current_parent = self.index.parent_of(id)?;
        if current_parent == new_parent {
            log::debug!("TreeStore::move_node: {} already under {:?}", id, new_parent);
            return Ok(Applied::Unchanged);
        }

        if has_name_collision(self.children(new_parent)?, &name, Some(id)) {
            return Err(TreeError::DuplicateName { name });
        }

        let new_parent_path = self.path_of_parent(new_parent)?;
        let source_route = self.index.route(id)?;
        let mut target_route = self.route_of_parent(new_parent)?;
        let (&slot, source_parent_route) =
            source_route.split_last().ok_or(TreeError::NotFound { id })?;

        let mut next = Forest::clone(&self.forest);
        let subtree = {
            let siblings = next
                .siblings_mut(source_parent_route)
                .filter(|siblings| slot < siblings.len())
                .ok_or(TreeError::NotFound { id })?;
            siblings.remove(slot)
        };
        adjust_route_after_detach(&mut target_route, &source_route);

        let plan = plan_move(subtree, new_parent_path.as_deref());
        let recomputed = plan.len();
        next.siblings_mut(&target_route)
            .ok_or(TreeError::NotFound {
                id: new_parent.unwrap_or(id),
            })?
            .push(plan.subtree);

        let mutation = Mutation::Moved {
            id,
            from_parent: current_parent,
            to_parent: new_parent,
            recomputed,
        };
        self.commit(next, origin, mutation.clone())?;
        Ok(Applied::Committed(mutation))
    }

    /// Swap in the next forest, rebuild the index and notify observers
    fn commit(&mut self, next: Forest, origin: Origin, mutation: Mutation) -> TreeResult<()> {
        let index = TreeIndex::build(&next)?;
        self.forest = Arc::new(next);
        self.index = index;
        self.revision += 1;

        log::debug!(
            "TreeStore::commit: revision {} ({:?}) {:?}",
            self.revision,
            origin,
            mutation
        );

        let event = ChangeEvent {
            revision: self.revision,
            origin,
            mutation,
            committed_at: Utc::now(),
            snapshot: Arc::clone(&self.forest),
        };
        for (_, observer) in &self.observers {
            observer.on_change(&event);
        }
        Ok(())
    }
}

/// Log a rejected operation and pass the result through unchanged
fn log_rejection<T>(operation: &str, result: TreeResult<T>) -> TreeResult<T> {
    if let Err(error) = &result {
        log::info!("TreeStore::{}: rejected: {}", operation, error);
    }
    result
}
