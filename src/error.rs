use crate::node::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// Why a move target was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetViolation {
    /// The target is a File and cannot own children
    FileTarget,
    /// The target is the moved node itself
    SelfTarget,
    /// The target lies inside the moved subtree
    DescendantTarget,
}

impl std::fmt::Display for TargetViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetViolation::FileTarget => write!(f, "target is a file"),
            TargetViolation::SelfTarget => write!(f, "target is the node itself"),
            TargetViolation::DescendantTarget => write!(f, "target is a descendant of the node"),
        }
    }
}

/// Rejections produced by tree mutations. A rejected operation leaves the
/// forest exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {id} not found")]
    NotFound { id: NodeId },

    #[error("cannot create a child under {id}: it is a file")]
    InvalidParent { id: NodeId },

    #[error("cannot move {id} under {target}: {violation}")]
    InvalidTarget {
        id: NodeId,
        target: NodeId,
        violation: TargetViolation,
    },

    #[error("a sibling named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("node id {id} is already in use")]
    DuplicateId { id: NodeId },

    #[error("'{name}' is not a valid name: it contains the path separator")]
    InvalidName { name: String },
}

impl TreeError {
    /// Stable snake_case name, used by scripts and the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            TreeError::NotFound { .. } => "not_found",
            TreeError::InvalidParent { .. } => "invalid_parent",
            TreeError::InvalidTarget { .. } => "invalid_target",
            TreeError::DuplicateName { .. } => "duplicate_name",
            TreeError::DuplicateId { .. } => "duplicate_id",
            TreeError::InvalidName { .. } => "invalid_name",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Invalid intent: {0}")]
    Intent(String),

    #[error("Script error on line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Error: {0}")]
    Generic(String),
}

impl From<String> for WorkspaceError {
    fn from(error: String) -> Self {
        WorkspaceError::Generic(error)
    }
}

impl From<&str> for WorkspaceError {
    fn from(error: &str) -> Self {
        WorkspaceError::Generic(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        let id = NodeId::generate();
        assert_eq!(TreeError::NotFound { id }.kind(), "not_found");
        assert_eq!(TreeError::InvalidParent { id }.kind(), "invalid_parent");
        assert_eq!(
            TreeError::DuplicateName {
                name: "a".to_string()
            }
            .kind(),
            "duplicate_name"
        );
        assert_eq!(
            TreeError::InvalidName {
                name: "a/b".to_string()
            }
            .kind(),
            "invalid_name"
        );
    }

    #[test]
    fn test_invalid_target_message_names_violation() {
        let id = NodeId::generate();
        let err = TreeError::InvalidTarget {
            id,
            target: id,
            violation: TargetViolation::SelfTarget,
        };
        assert!(err.to_string().contains("target is the node itself"));
    }

    #[test]
    fn test_tree_error_converts_into_workspace_error() {
        let err: WorkspaceError = TreeError::DuplicateName {
            name: "x".to_string(),
        }
        .into();
        assert!(matches!(err, WorkspaceError::Tree(TreeError::DuplicateName { .. })));
        assert_eq!(err.to_string(), "a sibling named 'x' already exists");
    }
}
