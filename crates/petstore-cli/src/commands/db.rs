//! Schema migration commands

use clap::{Args, Subcommand};
use petstore_core::schema::Model;
use petstore_core::{Pet, StoreConfig};
use petstore_store::migrations::{self, Migration};
use petstore_store::Database;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct DbArgs {
    /// Migration directory to use instead of the built-in migrations
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Apply migrations up to a revision (default: the latest)
    Upgrade {
        #[arg(long)]
        to: Option<String>,
    },
    /// Revert migrations down to a revision (default: one step; `base` reverts all)
    Downgrade {
        #[arg(long)]
        to: Option<String>,
    },
    /// Show the current revision
    Current,
    /// List known migrations and whether they are applied
    History,
    /// Generate the next migration from the declared schema (needs --dir)
    Revision {
        #[arg(short, long)]
        message: String,
    },
    /// Write the built-in migrations into --dir
    Init,
}

const BASE: &str = "base";

pub fn execute(args: DbArgs, config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dir = args.dir;
    match args.command {
        DbCommand::Init => execute_init(dir),
        DbCommand::Upgrade { to } => {
            with_database(dir.as_deref(), config, |db, migs| execute_upgrade(db, migs, to))
        }
        DbCommand::Downgrade { to } => {
            with_database(dir.as_deref(), config, |db, migs| execute_downgrade(db, migs, to))
        }
        DbCommand::Current => with_database(dir.as_deref(), config, |db, _| execute_current(db)),
        DbCommand::History => {
            with_database(dir.as_deref(), config, |db, migs| execute_history(db, migs))
        }
        DbCommand::Revision { message } => {
            let target_dir = dir.clone().ok_or("db revision needs --dir")?;
            with_database(dir.as_deref(), config, |db, migs| {
                execute_revision(db, migs, &target_dir, &message)
            })
        }
    }
}

/// Open the database without auto-migration and load the migration set
fn with_database<F>(
    dir: Option<&Path>,
    config: &StoreConfig,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Database, &[Migration]) -> Result<(), Box<dyn std::error::Error>>,
{
    let migrations = match dir {
        Some(dir) => migrations::load_dir(dir)?,
        None => migrations::embedded_migrations(),
    };
    // Migration commands manage the schema themselves
    let config = StoreConfig {
        auto_migrate: false,
        ..config.clone()
    };

    let mut db = Database::open(&config)?;
    let result = f(&mut db, &migrations);
    db.close()?;
    result
}

fn execute_init(dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let dir = dir.ok_or("db init needs --dir")?;
    for migration in migrations::embedded_migrations() {
        let (up, down) = migration.write_to(&dir)?;
        println!("Wrote {}", up.display());
        println!("Wrote {}", down.display());
    }
    Ok(())
}

fn execute_upgrade(
    db: &mut Database,
    migrations: &[Migration],
    to: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let applied = migrations::upgrade(db.connection_mut(), migrations, to.as_deref())?;
    if applied.is_empty() {
        println!("Already at target revision");
    }
    for id in applied {
        println!("Applied {}", id);
    }
    Ok(())
}

fn execute_downgrade(
    db: &mut Database,
    migrations: &[Migration],
    to: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = match to.as_deref() {
        Some(BASE) => None,
        Some(id) => Some(id.to_string()),
        None => previous_revision(db, migrations)?,
    };

    let reverted = migrations::downgrade(db.connection_mut(), migrations, target.as_deref())?;
    if reverted.is_empty() {
        println!("Already at target revision");
    }
    for id in reverted {
        println!("Reverted {}", id);
    }
    Ok(())
}

/// Revision one step below the current one; `None` means base
fn previous_revision(
    db: &Database,
    migrations: &[Migration],
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let current = migrations::current_revision(db.connection())?;
    let position = current
        .as_deref()
        .and_then(|id| migrations.iter().position(|m| m.id == id));
    Ok(match position {
        Some(index) if index > 0 => Some(migrations[index - 1].id.clone()),
        _ => None,
    })
}

fn execute_current(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    match migrations::current_revision(db.connection())? {
        Some(id) => println!("{}", id),
        None => println!("{}", BASE),
    }
    Ok(())
}

fn execute_history(
    db: &Database,
    migrations: &[Migration],
) -> Result<(), Box<dyn std::error::Error>> {
    for entry in migrations::history(db.connection(), migrations)? {
        let state = match entry.applied_at {
            Some(at) => format!("applied {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "pending".to_string(),
        };
        let marker = if entry.is_current { " (current)" } else { "" };
        println!("{}  {}{}", entry.id, state, marker);
    }
    Ok(())
}

fn execute_revision(
    db: &Database,
    migrations: &[Migration],
    dir: &Path,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match migrations::autogenerate(db.connection(), migrations, &[Pet::table_def()], message)? {
        Some(script) => {
            let (up, down) = script.write_to(dir)?;
            println!("Generated {}", script.id());
            for op in &script.ops {
                println!("  {}", op.describe());
            }
            println!("Wrote {}", up.display());
            println!("Wrote {}", down.display());
        }
        None => println!("No changes detected"),
    }
    Ok(())
}
