use crate::error::{Result, TreeError};
use crate::guard::{has_name_collision, is_valid_name};
use crate::index::TreeIndex;
use crate::node::Node;
use crate::path;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// The ordered sequence of root-level nodes making up a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    roots: Vec<Node>,
}

impl Forest {
    /// Create an empty forest
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Build a forest from hand-assembled roots, deriving every path
    pub fn from_roots(mut roots: Vec<Node>) -> Self {
        path::refresh_all(&mut roots, None);
        Self { roots }
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    /// Total number of nodes, at every depth
    pub fn len(&self) -> usize {
        self.roots.iter().map(|root| 1 + root.descendant_count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Node reached by following sibling slots from the root level down
    pub fn node_at(&self, route: &[usize]) -> Option<&Node> {
        let (first, rest) = route.split_first()?;
        let mut node = self.roots.get(*first)?;
        for slot in rest {
            node = node.children().get(*slot)?;
        }
        Some(node)
    }

    pub(crate) fn node_at_mut(&mut self, route: &[usize]) -> Option<&mut Node> {
        let (first, rest) = route.split_first()?;
        let mut node = self.roots.get_mut(*first)?;
        for slot in rest {
            node = node.children_mut()?.get_mut(*slot)?;
        }
        Some(node)
    }

    /// Sibling sequence owned by the node at `parent_route`, or the root
    /// sequence for an empty route. `None` if the route ends on a file.
    pub(crate) fn siblings_mut(&mut self, parent_route: &[usize]) -> Option<&mut Vec<Node>> {
        if parent_route.is_empty() {
            return Some(&mut self.roots);
        }
        self.node_at_mut(parent_route)?.children_mut()
    }

    /// Every node, depth-first, parents before children
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes = Vec::with_capacity(self.len());
        for root in &self.roots {
            root.walk(&mut |node| nodes.push(node));
        }
        nodes
    }

    /// Find a node by its canonical path
    pub fn find_by_path(&self, path: &str) -> Option<&Node> {
        self.nodes().into_iter().find(|node| node.path == path)
    }

    /// Nodes whose name contains `query`, ignoring case
    pub fn filter(&self, query: &str) -> Vec<&Node> {
        let lower_query = query.to_lowercase();
        self.nodes()
            .into_iter()
            .filter(|node| node.name.to_lowercase().contains(&lower_query))
            .collect()
    }

    /// Fuzzy-match node paths against `query`, best match first
    pub fn fuzzy_find(&self, query: &str) -> Vec<(i64, &Node)> {
        let matcher = SkimMatcherV2::default();
        let mut matches: Vec<(i64, &Node)> = self
            .nodes()
            .into_iter()
            .filter_map(|node| {
                matcher
                    .fuzzy_match(&node.path, query)
                    .map(|score| (score, node))
            })
            .collect();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.path.cmp(&b.1.path)));
        matches
    }

    /// Nodes that were created but never named
    pub fn provisional(&self) -> Vec<&Node> {
        self.nodes()
            .into_iter()
            .filter(|node| node.is_provisional())
            .collect()
    }

    /// Flattened view respecting folder expansion, with display depth
    pub fn visible_nodes_with_depth(&self) -> Vec<(&Node, usize)> {
        let mut visible = Vec::new();
        for root in &self.roots {
            Self::collect_visible(root, 0, &mut visible);
        }
        visible
    }

    fn collect_visible<'a>(node: &'a Node, depth: usize, visible: &mut Vec<(&'a Node, usize)>) {
        visible.push((node, depth));
        if node.is_expanded() {
            for child in node.children() {
                Self::collect_visible(child, depth + 1, visible);
            }
        }
    }

    /// Check id uniqueness, name validity and sibling name uniqueness across
    /// the forest
    pub fn validate(&self) -> std::result::Result<(), TreeError> {
        TreeIndex::build(self)?;
        Self::validate_siblings(&self.roots)
    }

    fn validate_siblings(siblings: &[Node]) -> std::result::Result<(), TreeError> {
        for (position, node) in siblings.iter().enumerate() {
            if !is_valid_name(&node.name) {
                return Err(TreeError::InvalidName {
                    name: node.name.clone(),
                });
            }
            if has_name_collision(&siblings[..position], &node.name, None) {
                return Err(TreeError::DuplicateName {
                    name: node.name.clone(),
                });
            }
            Self::validate_siblings(node.children())?;
        }
        Ok(())
    }

    /// Get forest statistics
    pub fn stats(&self) -> ForestStats {
        let mut stats = ForestStats::default();
        for root in &self.roots {
            Self::collect_stats(root, 0, &mut stats);
        }
        stats
    }

    fn collect_stats(node: &Node, depth: usize, stats: &mut ForestStats) {
        if node.is_folder() {
            stats.folders += 1;
            if node.is_expanded() {
                stats.expanded_folders += 1;
            }
        } else {
            stats.files += 1;
        }
        if node.is_provisional() {
            stats.provisional += 1;
        }
        stats.total_nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);

        for child in node.children() {
            Self::collect_stats(child, depth + 1, stats);
        }
    }

    /// Build a forest from a directory, honoring `.gitignore` and skipping
    /// hidden entries. Folders come first, then files, both by name.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let start_time = Instant::now();
        let root = dir.as_ref();
        log::info!("Forest::from_directory: scanning {:?}", root);

        let walk = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false)
            .build();

        let mut entries = Vec::new();
        for result in walk {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Forest::from_directory: skipping entry: {}", err);
                    continue;
                }
            };
            let absolute = entry.path();
            if absolute == root {
                continue;
            }
            let relative = absolute.strip_prefix(root).unwrap_or(absolute).to_path_buf();
            if relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push((relative, is_dir));
        }

        let forest = Self::from_relative_paths(entries);
        log::info!(
            "Forest::from_directory: {} nodes from {:?} in {:?}",
            forest.len(),
            root,
            start_time.elapsed()
        );
        Ok(forest)
    }

    /// Assemble nodes from relative paths, deepest entries first so that every
    /// folder is complete before it is attached to its parent
    fn from_relative_paths(mut entries: Vec<(PathBuf, bool)>) -> Self {
        entries.sort_by(|a, b| b.0.components().count().cmp(&a.0.components().count()));

        let mut nodes: HashMap<PathBuf, Node> = entries
            .iter()
            .map(|(relative, is_dir)| {
                let name = relative
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| relative.to_string_lossy().to_string());
                let node = if *is_dir {
                    Node::new_folder(name)
                } else {
                    Node::new_file(name)
                };
                (relative.clone(), node)
            })
            .collect();

        let mut roots = Vec::new();
        for (relative, _) in &entries {
            let Some(node) = nodes.remove(relative) else {
                continue;
            };
            let parent = relative.parent().filter(|p| !p.as_os_str().is_empty());
            match parent.and_then(|p| nodes.get_mut(p)) {
                Some(parent_node) => {
                    if let Some(children) = parent_node.children_mut() {
                        children.push(node);
                    }
                }
                None => roots.push(node),
            }
        }

        sort_directory_first(&mut roots);
        Self::from_roots(roots)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let forest: Forest = serde_json::from_str(&content)?;
        Ok(Self::from_roots(forest.roots))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn sort_directory_first(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    for node in nodes {
        if let Some(children) = node.children_mut() {
            sort_directory_first(children);
        }
    }
}

/// Statistics about a forest
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ForestStats {
    pub total_nodes: usize,
    pub files: usize,
    pub folders: usize,
    pub expanded_folders: usize,
    pub provisional: usize,
    pub max_depth: usize,
}
