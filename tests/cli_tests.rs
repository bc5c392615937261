use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use workspace_tree::cli::{Cli, Commands};
use workspace_tree::commands;
use workspace_tree::config::Config;
use workspace_tree::*;

#[test]
fn test_cli_parsing() {
    let cli = Cli::try_parse_from([
        "workspace-tree",
        "apply",
        "--forest",
        "tree.json",
        "-x",
        "create:folder:/:src",
    ])
    .unwrap();
    match cli.command {
        Commands::Apply {
            forest,
            intent,
            output,
        } => {
            assert_eq!(forest, PathBuf::from("tree.json"));
            assert_eq!(intent, "create:folder:/:src");
            assert!(output.is_none());
        }
        other => panic!("unexpected command: {:?}", other),
    }

    let cli = Cli::try_parse_from(["workspace-tree", "search", "-f", "t.json", "main", "--fuzzy", "-v"])
        .unwrap();
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::Search { fuzzy: true, .. }));

    let cli = Cli::try_parse_from(["workspace-tree", "import"]).unwrap();
    assert!(matches!(cli.command, Commands::Import { ref dir, .. } if dir == &PathBuf::from(".")));

    assert!(Cli::try_parse_from(["workspace-tree"]).is_err());
    assert!(Cli::try_parse_from(["workspace-tree", "apply", "--forest", "t.json"]).is_err());
}

#[test]
fn test_apply_chain_through_files() {
    let temp_dir = TempDir::new().unwrap();
    let forest = temp_dir.path().join("forest.json");

    assert_ok!(commands::apply_intent(&forest, "create:folder:/:src", Some(forest.as_path())));
    let src = Forest::load_from_file(&forest).unwrap().roots()[0].id;

    let json = format!(
        r#"{{"operation":"create","parent_id":"{}","kind":"file","name":"a.ts"}}"#,
        src
    );
    assert_ok!(commands::apply_intent(&forest, &json, Some(forest.as_path())));
    assert_ok!(commands::apply_intent(
        &forest,
        &format!("rename:{}:app", src),
        Some(forest.as_path())
    ));

    let loaded = Forest::load_from_file(&forest).unwrap();
    assert!(loaded.find_by_path("app/a.ts").is_some());

    assert_err!(commands::apply_intent(
        &forest,
        &format!("move:{}:{}", src, src),
        Some(forest.as_path())
    ));
    assert_eq!(Forest::load_from_file(&forest).unwrap(), loaded);
}

#[test]
fn test_replay_script_file() {
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("scenario.script");
    let output = temp_dir.path().join("out.json");
    fs::write(
        &script,
        "# build and reshape\n\
         create:folder:/:a\n\
         create:folder:a:b\n\
         create:file:a/b:notes.md\n\
         expect:invalid_target\n\
         move:a:a/b\n\
         move:a/b:/\n\
         assert:exists:b/notes.md\n\
         assert:children:/:a,b\n",
    )
    .unwrap();

    let report = commands::replay_script(&script, None, Some(output.as_path()), &Config::default())
        .unwrap();

    assert!(report.success(), "{}", report.summary());
    assert_eq!(report.rejections_expected, 1);
    let forest = Forest::load_from_file(&output).unwrap();
    assert_eq!(forest.len(), 3);
}

#[test]
fn test_replay_stops_on_failure_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("failing.script");
    fs::write(&script, "remove:ghost\nremove:phantom\n").unwrap();

    let mut config = Config::default();
    let report = commands::replay_script(&script, None, None, &config).unwrap();
    assert_eq!(report.failures.len(), 2);

    config.replay.stop_on_failure = true;
    let report = commands::replay_script(&script, None, None, &config).unwrap();
    assert_eq!(report.failures.len(), 1);
}

#[test]
fn test_import_directory_honors_gitignore() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(root.join("src/nested")).unwrap();
    fs::create_dir_all(root.join("target")).unwrap();
    fs::write(root.join(".gitignore"), "target/\n").unwrap();
    fs::write(root.join("src/nested/deep.rs"), "").unwrap();
    fs::write(root.join("src/main.rs"), "").unwrap();
    fs::write(root.join("Cargo.toml"), "").unwrap();
    fs::write(root.join("target/out.bin"), "").unwrap();
    let output = temp_dir.path().join("forest.json");

    let stats = commands::import_directory(&root, Some(output.as_path())).unwrap();
    assert_eq!(stats.files, 3);

    let forest = Forest::load_from_file(&output).unwrap();
    assert!(forest.find_by_path("src/nested/deep.rs").is_some());
    assert!(forest.find_by_path("target").is_none());
    assert!(forest.find_by_path(".gitignore").is_none());
    assert_eq!(forest.roots()[0].name, "src");
    assert_ok!(TreeStore::from_forest(forest));
}

#[test]
fn test_stats_rejects_corrupt_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("forest.json");
    fs::write(&path, "not json").unwrap();
    assert!(matches!(commands::stats(&path), Err(WorkspaceError::Json(_))));
}
