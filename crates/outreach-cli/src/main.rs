mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "outreach",
    about = "Outbound messaging and qualification surveys with meeting scheduling",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root holding the config file and database (default: auto-detect)
    #[arg(long, global = true, env = "OUTREACH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import contacts from a CSV file and send each a message
    SendMessages {
        /// CSV with a `phone`/`address` header, or positional `address,name` rows
        csv: PathBuf,
    },

    /// Run the qualification survey with one contact
    Survey {
        /// Contact address (e.g. phone number)
        #[arg(long)]
        address: String,

        /// Contact display name (default: the address)
        #[arg(long)]
        name: Option<String>,

        /// Read answers from stdin instead of waiting for replies
        #[arg(long)]
        interactive: bool,
    },

    /// Run the survey for every contact in a CSV file
    Bulk {
        csv: PathBuf,

        /// Maximum surveys in flight (default: `workers` from config)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Create or migrate the database schema
    UpdateDb {
        /// Insert sample contacts into an empty database
        #[arg(long)]
        seed: bool,
    },

    /// Print message and reply counts
    Stats,

    /// List persisted survey responses
    Responses,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Bulk { .. } => tracing::Level::INFO,
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
        Commands::SendMessages { csv } => cmd::send::run(&root, &csv, cli.json),
        Commands::Survey {
            address,
            name,
            interactive,
        } => cmd::survey::run(&root, &address, name.as_deref(), interactive, cli.json),
        Commands::Bulk { csv, workers } => cmd::bulk::run(&root, &csv, workers, cli.json),
        Commands::UpdateDb { seed } => cmd::db::update(&root, seed),
        Commands::Stats => cmd::db::stats(&root, cli.json),
        Commands::Responses => cmd::db::responses(&root, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
