// Testable bodies of the CLI subcommands

use crate::config::Config;
use crate::error::{Result, WorkspaceError};
use crate::forest::{Forest, ForestStats};
use crate::intent::{MutationIntent, Operation};
use crate::script::{ReplayReport, ScriptRunner};
use crate::store::{Applied, TreeStore};
use crate::sync::{self, IntentOutcome, IntentQueue};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Parse an intent given either as JSON (`{"operation": ...}`) or in the
/// compact text form (`rename:<id>:<name>`)
pub fn parse_intent(input: &str) -> Result<MutationIntent> {
    let input = input.trim();
    if input.starts_with('{') {
        Ok(serde_json::from_str(input)?)
    } else {
        input
            .parse::<Operation>()
            .map(MutationIntent::local)
            .map_err(WorkspaceError::Intent)
    }
}

fn load_forest_or_empty(path: &Path) -> Result<Forest> {
    if path.exists() {
        Forest::load_from_file(path)
    } else {
        log::info!("{} does not exist, starting from an empty forest", path.display());
        Ok(Forest::new())
    }
}

fn write_output(forest: &Forest, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            forest.save_to_file(path)?;
            eprintln!("Forest saved to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(forest)?),
    }
    Ok(())
}

/// Apply one intent to the snapshot at `forest_path` and write the result.
/// A rejected intent is an error and nothing is written.
pub fn apply_intent(forest_path: &Path, intent: &str, output: Option<&Path>) -> Result<Applied> {
    let forest = load_forest_or_empty(forest_path)?;
    let mut store = TreeStore::from_forest(forest)?;
    let intent = parse_intent(intent)?;

    let applied = store.apply(&intent)?;
    match applied.mutation() {
        Some(mutation) => eprintln!("Committed: {}", serde_json::to_string(mutation)?),
        None => eprintln!("Unchanged: {}", intent),
    }

    write_output(store.forest(), output)?;
    Ok(applied)
}

/// Run a replay script, starting from `forest_path` when given
pub fn replay_script(
    script: &Path,
    forest_path: Option<&Path>,
    output: Option<&Path>,
    config: &Config,
) -> Result<ReplayReport> {
    let forest = match forest_path {
        Some(path) => load_forest_or_empty(path)?,
        None => Forest::new(),
    };
    let mut store = TreeStore::from_forest(forest)?;

    let mut runner = ScriptRunner::from_file(script)?;
    runner.stop_on_failure = config.replay.stop_on_failure;
    let report = runner.run(&mut store);

    if let Some(path) = output {
        store.forest().save_to_file(path)?;
        eprintln!("Forest saved to: {}", path.display());
    }
    Ok(report)
}

/// Snapshot a real directory, honoring ignore files
pub fn import_directory(dir: &Path, output: Option<&Path>) -> Result<ForestStats> {
    let forest = Forest::from_directory(dir)?;
    let stats = forest.stats();
    write_output(&forest, output)?;
    Ok(stats)
}

/// Paths of nodes matching `query`, best match first when `fuzzy`
pub fn search(forest_path: &Path, query: &str, fuzzy: bool) -> Result<Vec<String>> {
    let forest = Forest::load_from_file(forest_path)?;
    let paths = if fuzzy {
        forest
            .fuzzy_find(query)
            .into_iter()
            .map(|(_, node)| node.path.clone())
            .collect()
    } else {
        forest
            .filter(query)
            .into_iter()
            .map(|node| node.path.clone())
            .collect()
    };
    Ok(paths)
}

pub fn stats(forest_path: &Path) -> Result<ForestStats> {
    let forest = Forest::load_from_file(forest_path)?;
    forest.validate()?;
    Ok(forest.stats())
}

/// Read intents from stdin, one per line, and apply them through the
/// worker queue. Outcomes are printed as they arrive. The forest is saved
/// back to `forest_path` when input ends.
pub async fn run_session(forest_path: &Path, config: &Config) -> Result<()> {
    run_session_with(forest_path, config, BufReader::new(tokio::io::stdin())).await
}

pub async fn run_session_with<R>(forest_path: &Path, config: &Config, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let store = TreeStore::from_forest(load_forest_or_empty(forest_path)?)?;
    let (queue, intents) = IntentQueue::channel(config.queue.capacity);
    let (outcome_sender, mut outcomes) = mpsc::channel::<IntentOutcome>(config.queue.capacity.max(1));
    let cancel = CancellationToken::new();

    let worker = tokio::spawn(sync::run_worker(
        store,
        intents,
        outcome_sender,
        None,
        config.remote.clone(),
        cancel.clone(),
    ));

    let printer = tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            match &outcome {
                IntentOutcome::Committed { revision, mutation } => {
                    println!("r{} {}", revision, serde_json::to_string(mutation).unwrap_or_default())
                }
                IntentOutcome::Unchanged { intent } => println!("unchanged {}", intent),
                IntentOutcome::Rejected { intent, error } => {
                    println!("rejected {}: {}", intent, error)
                }
                IntentOutcome::Skipped { intent, error } => {
                    println!("skipped {}: {}", intent, error)
                }
            }
        }
    });

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_intent(line) {
            Ok(intent) => queue.enqueue(intent).await?,
            Err(e) => eprintln!("Ignoring '{}': {}", line, e),
        }
    }
    drop(queue);

    let store = worker
        .await
        .map_err(|e| WorkspaceError::Generic(format!("worker failed: {}", e)))?;
    printer
        .await
        .map_err(|e| WorkspaceError::Generic(format!("outcome printer failed: {}", e)))?;

    store.forest().save_to_file(forest_path)?;
    eprintln!(
        "Session ended at revision {} with {} nodes",
        store.revision(),
        store.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use tempfile::TempDir;

    #[test]
    fn test_parse_intent_forms() {
        let text = parse_intent("create:folder:/:src").unwrap();
        assert_eq!(text.operation.name(), "create");
        assert!(!text.is_remote());

        let json =
            parse_intent(r#" {"origin":"remote","operation":"create","kind":"file"} "#).unwrap();
        assert!(json.is_remote());

        assert!(matches!(
            parse_intent("fly:away"),
            Err(WorkspaceError::Intent(_))
        ));
        assert!(matches!(parse_intent("{oops"), Err(WorkspaceError::Json(_))));
    }

    #[test]
    fn test_apply_intent_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("forest.json");
        let output = temp_dir.path().join("out.json");

        let applied = apply_intent(&input, "create:folder:/:src", Some(output.as_path())).unwrap();
        assert!(applied.mutation().is_some());

        let forest = Forest::load_from_file(&output).unwrap();
        assert_eq!(forest.roots()[0].path, "src");
    }

    #[test]
    fn test_apply_rejected_intent_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("forest.json");
        Forest::from_roots(vec![Node::new_file("f")])
            .save_to_file(&input)
            .unwrap();
        let output = temp_dir.path().join("out.json");

        let err = apply_intent(&input, "create:file:/:f", Some(output.as_path())).unwrap_err();
        assert!(matches!(err, WorkspaceError::Tree(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_search_and_stats() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("forest.json");
        Forest::from_roots(vec![Node::new_folder("src")
            .with_child(Node::new_file("Main.rs"))
            .with_child(Node::new_file("lib.rs"))])
        .save_to_file(&path)
        .unwrap();

        assert_eq!(search(&path, "main", false).unwrap(), vec!["src/Main.rs"]);
        assert!(!search(&path, "lb", true).unwrap().is_empty());

        let stats = stats(&path).unwrap();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.files, 2);
    }

    #[tokio::test]
    async fn test_session_applies_lines_and_saves() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("forest.json");
        let input: &[u8] = b"# session\ncreate:folder:/:src\nnot an intent\ncreate:file:/:src\n\ncreate:file:/:readme\n";

        run_session_with(&path, &Config::default(), input)
            .await
            .unwrap();

        let forest = Forest::load_from_file(&path).unwrap();
        assert_eq!(forest.len(), 2);
        assert!(forest.find_by_path("src").unwrap().is_folder());
        assert!(forest.find_by_path("readme").is_some());
    }
}
