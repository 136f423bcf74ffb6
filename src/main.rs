//! sheetcalc - persistent spreadsheet cells with cascading recomputation

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sheetcalc_core::api::{self, Response, WriteRequest};
use sheetcalc_core::{SqliteStore, Workbook};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "sheetcalc")]
#[command(author, version, about = "Spreadsheet cell store with formula propagation")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overrides the configured one
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a value or formula to a cell
    Set {
        sheet: String,
        cell: String,
        /// Number (`12.5`) or formula (`=a1+2`)
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Print one cell
    Get { sheet: String, cell: String },

    /// Print every cell of a sheet
    Sheet { sheet: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(response) if response.status.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Response> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database = db;
    }
    init_logging(&config.log_level, cli.verbose);
    debug!(database = %config.database.display(), "opening store");

    let store = SqliteStore::open_path_with_timeout(&config.database, config.busy_timeout())
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let workbook = Workbook::new(store);

    let response = match cli.command {
        Commands::Set { sheet, cell, value } => {
            api::write_cell(&workbook, &sheet, &cell, &WriteRequest { value })
        }
        Commands::Get { sheet, cell } => api::read_cell(&workbook, &sheet, &cell),
        Commands::Sheet { sheet } => api::read_sheet(&workbook, &sheet),
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(response)
}

/// Log to stderr. `RUST_LOG` wins over the configured level and `-v`.
fn init_logging(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
