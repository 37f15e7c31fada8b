mod board;
mod cli;
mod converter;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod settings;
mod store;

use clap::Parser;

use cli::{BidsCommands, BoardCommands, Cli, Commands, JobsCommands};

/// Log to stderr so command output stays clean. Quiet unless RUST_LOG says otherwise.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, user } => cli::init::run(data_dir, user),
        Commands::Import {
            file,
            format,
            dry_run,
        } => cli::import::run(&file, format.as_deref(), dry_run),
        Commands::Bids { command } => match command {
            BidsCommands::List { status } => cli::bids::list(status.as_deref()),
            BidsCommands::Show { id } => cli::bids::show(id),
            BidsCommands::Delete { id } => cli::bids::delete(id),
        },
        Commands::Board { command } => match command {
            None => cli::board::show(),
            Some(BoardCommands::Move {
                id,
                status,
                position,
            }) => cli::board::move_bid(id, &status, position),
        },
        Commands::Jobs { command } => match command {
            JobsCommands::Convert { bid_id } => cli::jobs::convert(bid_id),
            JobsCommands::List => cli::jobs::list(),
            JobsCommands::Show { id } => cli::jobs::show(id),
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
