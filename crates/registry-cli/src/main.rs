mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, pending::PendingSubcommand, student::StudentSubcommand,
};
use registry_core::types::{Caller, TrustLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "registry",
    about = "Student registry: records, approvals, audit trail, CSV transfer and offline sync",
    version,
    propagate_version = true
)]
struct Cli {
    /// Registry root (default: auto-detect from .registry/)
    #[arg(long, global = true, env = "REGISTRY_ROOT")]
    root: Option<PathBuf>,

    /// Name recorded in the audit trail
    #[arg(long, global = true, env = "REGISTRY_USER", default_value = "anonymous")]
    user: String,

    /// Trust level: writer, supervisor or admin
    #[arg(long, global = true, env = "REGISTRY_ROLE", default_value = "writer")]
    role: TrustLevel,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .registry/ with a default config and an empty store
    Init,

    /// Show the school name, specialist tracks and registry types
    Meta,

    /// Search active students by full name
    Search {
        /// Name fragment (empty lists everyone, up to the search limit)
        #[arg(default_value = "")]
        query: String,
    },

    /// Create, update, list, show and archive students
    Student {
        #[command(subcommand)]
        subcommand: StudentSubcommand,
    },

    /// Review writes waiting for approval
    Pending {
        #[command(subcommand)]
        subcommand: PendingSubcommand,
    },

    /// Show the most recent audit entries, newest first
    Audit {
        /// Number of entries (default: audit.default_tail from config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Import students from CSV (admin)
    Import {
        /// CSV file, or '-' for stdin
        file: PathBuf,
    },

    /// Export active students as CSV (admin)
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Apply a batch of operations queued offline
    Sync {
        /// JSON file with {"operations": [...]} or a bare array, or '-' for stdin
        file: PathBuf,
    },

    /// Show or validate the registry configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let caller = Caller::new(cli.user, cli.role);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Meta => cmd::meta::run(&root, cli.json),
        Commands::Search { query } => cmd::search::run(&root, &query, cli.json),
        Commands::Student { subcommand } => cmd::student::run(&root, &caller, subcommand, cli.json),
        Commands::Pending { subcommand } => cmd::pending::run(&root, &caller, subcommand, cli.json),
        Commands::Audit { limit } => cmd::audit::run(&root, &caller, limit, cli.json),
        Commands::Import { file } => cmd::transfer::import(&root, &caller, &file, cli.json),
        Commands::Export { out } => cmd::transfer::export(&root, &caller, out.as_deref(), cli.json),
        Commands::Sync { file } => cmd::sync::run(&root, &caller, &file, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
