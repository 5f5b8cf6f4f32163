//! Pet Store CLI
//!
//! Command-line interface for the pet record store

use clap::{Parser, Subcommand};
use petstore_core::logging_facility::{self, Profile};
use petstore_core::StoreConfig;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "petstore")]
#[command(about = "Pet record store - records and schema migrations", long_about = None)]
struct Cli {
    /// Database URL, overriding the config file and PETSTORE_DATABASE_URL
    #[arg(long, global = true)]
    db: Option<String>,

    /// Config file (defaults to ./petstore.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log operations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Schema migration operations
    Db(commands::db::DbArgs),
    /// Pet record operations
    Pet(commands::pet::PetArgs),
}

fn load_config(cli: &Cli) -> Result<StoreConfig, Box<dyn std::error::Error>> {
    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.db {
        config.database_url = url.clone();
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        logging_facility::init(Profile::Development);
    }

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Db(args) => commands::db::execute(args, &config),
        Commands::Pet(args) => commands::pet::execute(args, &config),
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
