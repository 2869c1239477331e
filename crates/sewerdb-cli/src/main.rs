//! SewerDB command-line tool.
//!
//! Opens a database directory and runs one command against it.

mod commands;
mod config;
mod error;
mod formatter;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sewerdb::Database;

use config::{Args, Command};
use error::CliError;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sewerdb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let (config, command) = args.into_config();
    tracing::debug!(data_path = %config.path.display(), ?command, "configuration loaded");

    let db = Database::open(config)?;

    match command {
        Command::Bootstrap => println!("{}", commands::bootstrap(&db)?),
        Command::Describe { format } => println!("{}", commands::describe(&db, format)?),
        Command::Tables => println!("{}", commands::tables(&db)?),
        Command::Dump { entity } => {
            let out = commands::dump(&db, &entity)?;
            if !out.is_empty() {
                println!("{out}");
            }
        }
        Command::Check => {
            let report = commands::check(&db)?;
            println!("{}", report.render());
            if !report.violations.is_empty() {
                return Err(CliError::CheckFailed(report.violations.len()));
            }
        }
    }

    db.close()?;
    Ok(())
}
