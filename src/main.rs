use clap::Parser;
use workspace_tree::cli::{Cli, Commands};
use workspace_tree::commands;
use workspace_tree::config::Config;
use workspace_tree::error::{Result, WorkspaceError};

fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    // WORKSPACE_TREE_LOG names a file to append debug logs to
    if let Ok(log_file) = std::env::var("WORKSPACE_TREE_LOG") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        env_logger::Builder::new()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::new()
            .filter_level(config.log.level_filter())
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config)?;

    log::info!("workspace-tree starting up");

    match cli.command {
        Commands::Apply {
            forest,
            intent,
            output,
        } => {
            commands::apply_intent(&forest, &intent, output.as_deref())?;
        }
        Commands::Replay {
            script,
            forest,
            output,
        } => {
            let report =
                commands::replay_script(&script, forest.as_deref(), output.as_deref(), &config)?;
            println!("{}", report.summary());
            if !report.success() {
                return Err(WorkspaceError::from("Replay failed"));
            }
        }
        Commands::Import { dir, output } => {
            let stats = commands::import_directory(&dir, output.as_deref())?;
            eprintln!(
                "Imported {} files and {} folders",
                stats.files, stats.folders
            );
        }
        Commands::Search {
            forest,
            query,
            fuzzy,
        } => {
            for path in commands::search(&forest, &query, fuzzy)? {
                println!("{}", path);
            }
        }
        Commands::Stats { forest } => {
            let stats = commands::stats(&forest)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Session { forest } => {
            commands::run_session(&forest, &config).await?;
        }
    }

    Ok(())
}
