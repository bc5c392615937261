//! A workspace file tree for collaborative editing.
//!
//! A [`forest::Forest`] of files and folders is owned by a
//! [`store::TreeStore`], which validates and commits every mutation
//! atomically, keeps each node's `path` equal to the `/`-joined names of its
//! ancestors, rejects duplicate sibling names and refuses moves that would
//! create a cycle. [`sync`] serializes local and remote intents through a
//! single worker.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod forest;
pub mod guard;
pub mod index;
pub mod intent;
pub mod moves;
pub mod node;
pub mod path;
pub mod script;
pub mod store;
pub mod sync;

pub use error::{Result, TargetViolation, TreeError, WorkspaceError};
pub use forest::{Forest, ForestStats};
pub use index::{Location, TreeIndex};
pub use intent::{MutationIntent, Operation, Origin};
pub use node::{Kind, Node, NodeId, NodeKind};
pub use store::{Applied, ChangeEvent, ForestObserver, Mutation, ObserverId, TreeResult, TreeStore};
pub use sync::{IntentOutcome, IntentQueue, RemoteChannel};
