use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "workspace-tree")]
#[command(about = "Maintain a collaborative workspace file tree snapshot")]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a single intent to a forest snapshot
    Apply {
        /// Forest snapshot (created empty when missing)
        #[arg(short, long)]
        forest: PathBuf,
        /// Intent as JSON or text, e.g. "create:folder:/:src"
        #[arg(short = 'x', long)]
        intent: String,
        /// Output file for the resulting forest (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a replay script of path-addressed steps and assertions
    Replay {
        /// Path to the script file
        script: PathBuf,
        /// Starting forest (empty when omitted)
        #[arg(short, long)]
        forest: Option<PathBuf>,
        /// Save the final forest here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build a forest snapshot from a directory
    Import {
        /// Directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Find nodes by name
    Search {
        #[arg(short, long)]
        forest: PathBuf,
        query: String,
        /// Rank by fuzzy match instead of substring filtering
        #[arg(long)]
        fuzzy: bool,
    },
    /// Print forest statistics as JSON
    Stats {
        #[arg(short, long)]
        forest: PathBuf,
    },
    /// Read intents from stdin and apply them through the intent queue
    Session {
        #[arg(short, long)]
        forest: PathBuf,
    },
}
