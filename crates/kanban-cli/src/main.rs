mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    account::AccountSubcommand, board::BoardSubcommand, config::ConfigSubcommand,
    task::TaskSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kanban",
    about = "Team kanban boards with capacity-limited columns",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .kanban/)
    #[arg(long, global = true, env = "KANBAN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .kanban/ with a default config and an empty database
    Init {
        /// Overwrite an existing config.yaml with the defaults
        #[arg(long)]
        force: bool,
    },

    /// Run the HTTP API server
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
        /// Open a browser once the server is listening
        #[arg(long)]
        open: bool,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage team accounts
    Account {
        #[command(subcommand)]
        subcommand: AccountSubcommand,
    },

    /// Manage boards
    Board {
        #[command(subcommand)]
        subcommand: BoardSubcommand,
    },

    /// Add, list, move and delete tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { force } => cmd::init::run(&root, force),
        Commands::Serve { port, open } => cmd::serve::run(&root, port, open),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Account { subcommand } => cmd::account::run(&root, subcommand, cli.json),
        Commands::Board { subcommand } => cmd::board::run(&root, subcommand, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
