use proptest::prelude::*;
use std::collections::HashSet;
use workspace_tree::*;

#[derive(Debug, Clone)]
enum Step {
    Create { parent: Option<usize>, folder: bool, name: usize },
    Rename { target: usize, name: usize },
    Remove { target: usize },
    Move { target: usize, parent: Option<usize> },
}

const NAMES: &[&str] = &["a", "b", "src", "lib.rs", "A", "", "a/b"];

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (proptest::option::of(0..64usize), any::<bool>(), 0..NAMES.len())
            .prop_map(|(parent, folder, name)| Step::Create { parent, folder, name }),
        1 => (0..64usize, 0..NAMES.len()).prop_map(|(target, name)| Step::Rename { target, name }),
        1 => (0..64usize).prop_map(|target| Step::Remove { target }),
        2 => (0..64usize, proptest::option::of(0..64usize))
            .prop_map(|(target, parent)| Step::Move { target, parent }),
    ]
}

fn pick(ids: &[NodeId], slot: usize) -> Option<NodeId> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[slot % ids.len()])
    }
}

fn check_invariants(store: &TreeStore) -> std::result::Result<(), TestCaseError> {
    let mut ids = HashSet::new();
    for node in store.forest().nodes() {
        prop_assert!(ids.insert(node.id));

        let ancestors = store.ancestors(node.id).unwrap();
        prop_assert!(ancestors.iter().all(|a| a.id != node.id));

        let mut names: Vec<&str> = ancestors.iter().map(|a| a.name.as_str()).collect();
        names.push(&node.name);
        prop_assert_eq!(&node.path, &names.join("/"));
        prop_assert_eq!(&node.path, &store.resolve_path(node.id).unwrap());
        prop_assert!(!node.name.contains('/'));

        let mut siblings = HashSet::new();
        for child in node.children() {
            prop_assert!(child.name.is_empty() || siblings.insert(child.name.clone()));
        }
        prop_assert!(node.is_folder() || node.children().is_empty());
    }

    let mut roots = HashSet::new();
    for root in store.forest().roots() {
        prop_assert!(root.name.is_empty() || roots.insert(root.name.clone()));
    }
    prop_assert_eq!(ids.len(), store.len());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn random_operations_preserve_invariants(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let mut store = TreeStore::new();

        for step in steps {
            let ids: Vec<NodeId> = store.forest().nodes().iter().map(|n| n.id).collect();
            let before = store.snapshot();
            let revision = store.revision();

            let result = match step {
                Step::Create { parent, folder, name } => {
                    let parent = parent.and_then(|slot| pick(&ids, slot));
                    let kind = if folder { Kind::Folder } else { Kind::File };
                    store.create_named(parent, kind, NAMES[name]).map(|_| ())
                }
                Step::Rename { target, name } => match pick(&ids, target) {
                    Some(id) => store.rename(id, NAMES[name]).map(|_| ()),
                    None => Ok(()),
                },
                Step::Remove { target } => match pick(&ids, target) {
                    Some(id) => {
                        let count = store.len();
                        let removed = store.remove(id).unwrap();
                        prop_assert_eq!(store.len(), count - 1 - removed.descendant_count());
                        prop_assert!(!store.contains(id));
                        Ok(())
                    }
                    None => Ok(()),
                },
                Step::Move { target, parent } => match pick(&ids, target) {
                    Some(id) => {
                        let parent = parent.and_then(|slot| pick(&ids, slot));
                        let count = store.len();
                        let result = store.move_node(id, parent).map(|_| ());
                        prop_assert_eq!(store.len(), count);
                        result
                    }
                    None => Ok(()),
                },
            };

            if result.is_err() {
                prop_assert_eq!(store.revision(), revision);
                prop_assert_eq!(&*store.snapshot(), &*before);
            }
            check_invariants(&store)?;
        }
    }
}
