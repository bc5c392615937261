use crate::node::{Kind, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a mutation intent came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Local,
    Remote,
}

/// A requested change to the forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum Operation {
    /// Create a node under `parent_id` (root level when absent). `id` is set
    /// when a peer relays a creation so both sides agree on the id.
    Create {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<NodeId>,
        #[serde(default)]
        parent_id: Option<NodeId>,
        kind: Kind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Rename {
        target_id: NodeId,
        name: String,
    },
    Remove {
        target_id: NodeId,
    },
    Move {
        target_id: NodeId,
        #[serde(default)]
        new_parent_id: Option<NodeId>,
    },
}

impl Operation {
    /// Short operation name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Rename { .. } => "rename",
            Operation::Remove { .. } => "remove",
            Operation::Move { .. } => "move",
        }
    }

    /// The node the operation acts on, if it already exists
    pub fn target_id(&self) -> Option<NodeId> {
        match self {
            Operation::Create { .. } => None,
            Operation::Rename { target_id, .. }
            | Operation::Remove { target_id }
            | Operation::Move { target_id, .. } => Some(*target_id),
        }
    }
}

fn parse_id(s: &str) -> Result<NodeId, String> {
    s.trim()
        .parse()
        .map_err(|e| format!("Invalid node id '{}': {}", s, e))
}

fn parse_parent(s: &str) -> Result<Option<NodeId>, String> {
    match s.trim() {
        "" | "/" | "root" => Ok(None),
        other => parse_id(other).map(Some),
    }
}

fn format_parent(parent: &Option<NodeId>) -> String {
    parent.map(|id| id.to_string()).unwrap_or_else(|| "/".to_string())
}

impl FromStr for Operation {
    type Err = String;

    /// Parse the compact text form:
    /// `create:<kind>:<parent|/>[:<name>]`, `rename:<id>:<name>`,
    /// `remove:<id>`, `move:<id>:<parent|/>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = s.split_once(':').unwrap_or((s, ""));
        match verb.trim().to_lowercase().as_str() {
            "create" | "new" => {
                let mut parts = rest.splitn(3, ':');
                let kind = parts
                    .next()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| format!("Missing node kind in '{}'", s))?
                    .parse::<Kind>()?;
                let parent_id = parse_parent(parts.next().unwrap_or(""))?;
                let name = parts.next().map(|n| n.to_string());
                Ok(Operation::Create {
                    id: None,
                    parent_id,
                    kind,
                    name,
                })
            }
            "rename" => {
                let (id, name) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("Expected rename:<id>:<name>, got '{}'", s))?;
                Ok(Operation::Rename {
                    target_id: parse_id(id)?,
                    name: name.to_string(),
                })
            }
            "remove" | "delete" => Ok(Operation::Remove {
                target_id: parse_id(rest)?,
            }),
            "move" => {
                let (id, parent) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("Expected move:<id>:<parent>, got '{}'", s))?;
                Ok(Operation::Move {
                    target_id: parse_id(id)?,
                    new_parent_id: parse_parent(parent)?,
                })
            }
            _ => Err(format!("Unknown operation: {}", s)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create {
                parent_id,
                kind,
                name,
                ..
            } => {
                write!(f, "create:{}:{}", kind, format_parent(parent_id))?;
                if let Some(name) = name {
                    write!(f, ":{}", name)?;
                }
                Ok(())
            }
            Operation::Rename { target_id, name } => write!(f, "rename:{}:{}", target_id, name),
            Operation::Remove { target_id } => write!(f, "remove:{}", target_id),
            Operation::Move {
                target_id,
                new_parent_id,
            } => write!(f, "move:{}:{}", target_id, format_parent(new_parent_id)),
        }
    }
}

/// An operation together with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationIntent {
    #[serde(default)]
    pub origin: Origin,
    #[serde(flatten)]
    pub operation: Operation,
}

impl MutationIntent {
    pub fn local(operation: Operation) -> Self {
        Self {
            origin: Origin::Local,
            operation,
        }
    }

    pub fn remote(operation: Operation) -> Self {
        Self {
            origin: Origin::Remote,
            operation,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.origin == Origin::Remote
    }
}

impl fmt::Display for MutationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Local => write!(f, "{}", self.operation),
            Origin::Remote => write!(f, "remote {}", self.operation),
        }
    }
}
