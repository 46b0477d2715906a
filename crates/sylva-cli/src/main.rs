//! Sylva CLI - Command-line interface for Sylva
//!
//! This is the main entry point for users interacting with Sylva.
//! It provides commands for analyzing a workspace and inspecting the
//! resulting code graph.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "sylva")]
#[command(author = "Sylva Contributors")]
#[command(version)]
#[command(about = "Semantic code graphs for JavaScript and TypeScript", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Sylva in a directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Analyze the workspace and update the graph
    Analyze {
        /// Path to analyze (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Re-analyze files even if their content is unchanged
        #[arg(long)]
        force: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the stored graph by name
    Query {
        /// Name or part of a name
        query: String,

        /// Only nodes of this kind (e.g. FUNCTION, CALL)
        #[arg(short, long)]
        kind: Option<String>,

        /// Only nodes declared in this file
        #[arg(short, long)]
        file: Option<String>,

        /// Maximum results to return
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Workspace path (defaults to current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Show graph status and statistics
    Status {
        /// Path to check (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Remove stored facts, for one file or the whole graph
    Clear {
        /// Workspace path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only clear facts of this file (workspace-relative)
        #[arg(long)]
        file: Option<String>,
    },

    /// Export the graph to JSON
    Export {
        /// Output file
        #[arg(short, long, default_value = "sylva-graph.json")]
        output: PathBuf,

        /// Workspace path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Analyze { path, force, json } => commands::analyze(&path, force, json).await,
        Commands::Query {
            query,
            kind,
            file,
            limit,
            path,
        } => commands::query(&path, &query, kind.as_deref(), file.as_deref(), limit),
        Commands::Status { path } => commands::status(&path),
        Commands::Clear { path, file } => commands::clear(&path, file.as_deref()),
        Commands::Export { output, path } => commands::export(&path, &output),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
