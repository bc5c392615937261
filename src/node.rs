use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, immutable node identifier, unique across a forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

/// Node kind as requested by a create intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    File,
    Folder,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::File => write!(f, "file"),
            Kind::Folder => write!(f, "folder"),
        }
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "leaf" => Ok(Kind::File),
            "folder" | "dir" | "internal" => Ok(Kind::Folder),
            _ => Err(format!("Unknown node kind: {}", s)),
        }
    }
}

/// File/Folder distinction. Only the Folder variant owns children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder {
        children: Vec<Node>,
        #[serde(default)]
        expanded: bool,
    },
}

/// A single entry of the workspace tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Derived: `/`-joined names from the root down to this node
    pub path: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Create a node with a fresh id. The path is the bare name until the
    /// node is placed in a forest.
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self::with_id(NodeId::generate(), name, kind)
    }

    pub fn with_id(id: NodeId, name: impl Into<String>, kind: Kind) -> Self {
        let name = name.into();
        let kind = match kind {
            Kind::File => NodeKind::File,
            Kind::Folder => NodeKind::Folder {
                children: Vec::new(),
                expanded: false,
            },
        };
        Self {
            id,
            path: name.clone(),
            name,
            kind,
        }
    }

    pub fn new_file(name: impl Into<String>) -> Self {
        Self::new(name, Kind::File)
    }

    pub fn new_folder(name: impl Into<String>) -> Self {
        Self::new(name, Kind::Folder)
    }

    /// Builder used when assembling trees by hand. Files ignore the child.
    pub fn with_child(mut self, child: Node) -> Self {
        if let NodeKind::Folder { children, .. } = &mut self.kind {
            children.push(child);
        }
        self
    }

    pub fn kind(&self) -> Kind {
        match self.kind {
            NodeKind::File => Kind::File,
            NodeKind::Folder { .. } => Kind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File)
    }

    /// A node is provisional until its first successful rename
    pub fn is_provisional(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { expanded: true, .. })
    }

    /// Children of a folder; always empty for files
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::File => &[],
            NodeKind::Folder { children, .. } => children,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.kind {
            NodeKind::File => None,
            NodeKind::Folder { children, .. } => Some(children),
        }
    }

    pub(crate) fn set_expanded(&mut self, value: bool) -> bool {
        match &mut self.kind {
            NodeKind::File => false,
            NodeKind::Folder { expanded, .. } => {
                *expanded = value;
                true
            }
        }
    }

    /// Lowercased extension of a file name (`Main.TS` -> `ts`)
    pub fn extension(&self) -> Option<String> {
        if self.is_folder() {
            return None;
        }
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Visit this node and its descendants depth-first, parents before children
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a Node),
    {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}
