use crate::node::{Node, NodeId};
use crate::path::SEPARATOR;

/// A name may not contain the path separator, otherwise two different nodes
/// could share one path
pub fn is_valid_name(name: &str) -> bool {
    !name.contains(SEPARATOR)
}

/// True when a sibling other than `exclude` is already called `candidate`.
///
/// Names are compared exactly: case-sensitive, no Unicode normalization.
/// An empty candidate never collides, since an empty name marks a node that
/// has not been named yet.
pub fn has_name_collision(siblings: &[Node], candidate: &str, exclude: Option<NodeId>) -> bool {
    if candidate.is_empty() {
        return false;
    }
    siblings
        .iter()
        .filter(|sibling| Some(sibling.id) != exclude)
        .any(|sibling| sibling.name == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings() -> Vec<Node> {
        vec![
            Node::new_file("main.rs"),
            Node::new_folder("src"),
            Node::new_file(""),
        ]
    }

    #[test]
    fn test_detects_collision() {
        let nodes = siblings();
        assert!(has_name_collision(&nodes, "main.rs", None));
        assert!(has_name_collision(&nodes, "src", None));
        assert!(!has_name_collision(&nodes, "lib.rs", None));
    }

    #[test]
    fn test_excluded_node_does_not_collide_with_itself() {
        let nodes = siblings();
        let id = nodes[0].id;
        assert!(!has_name_collision(&nodes, "main.rs", Some(id)));
        assert!(has_name_collision(&nodes, "src", Some(id)));
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        let nodes = siblings();
        assert!(!has_name_collision(&nodes, "Main.rs", None));
        assert!(!has_name_collision(&nodes, "SRC", None));
    }

    #[test]
    fn test_empty_candidate_never_collides() {
        assert!(!has_name_collision(&siblings(), "", None));
    }

    #[test]
    fn test_separator_makes_name_invalid() {
        assert!(is_valid_name("main.rs"));
        assert!(is_valid_name(""));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("/"));
    }

    #[test]
    fn test_empty_sibling_set() {
        assert!(!has_name_collision(&[], "anything", None));
    }
}
