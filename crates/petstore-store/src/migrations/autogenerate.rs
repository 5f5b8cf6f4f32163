//! Migration autogeneration
//!
//! Diffs the live schema against the declared tables and renders the next
//! migration script. The database must be at head so the new script
//! describes exactly the change between the last migration and the
//! declarations.

use petstore_core::schema::diff::{downgrade_sql, upgrade_sql};
use petstore_core::schema::{diff_schema, SchemaOp, TableDef};
use petstore_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::errors::{migration_conflict, Result};
use crate::migrations::embedded::Migration;
use crate::migrations::introspect::live_tables;
use crate::migrations::runner::validate_history;

const MAX_SLUG_LEN: usize = 40;

/// A rendered, not yet applied migration
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationScript {
    pub migration: Migration,
    pub message: String,
    pub ops: Vec<SchemaOp>,
}

impl MigrationScript {
    pub fn id(&self) -> &str {
        &self.migration.id
    }

    /// Write `NNN_slug.up.sql` / `NNN_slug.down.sql` into `dir`
    ///
    /// # Errors
    ///
    /// Returns `Io` when the files cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        self.migration.write_to(dir)
    }
}

/// Render the migration that brings the database to `declared`
///
/// Returns `None` when the live schema already matches.
///
/// # Errors
///
/// Returns `MigrationConflict` when the database is not at the last
/// migration of `migrations`, when its history disagrees with them, or when
/// the difference cannot be expressed as an automatic migration.
pub fn autogenerate(
    conn: &Connection,
    migrations: &[Migration],
    declared: &[TableDef],
    message: &str,
) -> Result<Option<MigrationScript>> {
    log_op_start!("migrations_autogenerate", message = message);
    let start = std::time::Instant::now();

    let script = autogenerate_impl(conn, migrations, declared, message).map_err(|e| {
        log_op_error!(
            "migrations_autogenerate",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "migrations_autogenerate",
        duration_ms = start.elapsed().as_millis() as u64,
        row_count = script.as_ref().map_or(0, |s| s.ops.len())
    );
    Ok(script)
}

fn autogenerate_impl(
    conn: &Connection,
    migrations: &[Migration],
    declared: &[TableDef],
    message: &str,
) -> Result<Option<MigrationScript>> {
    let applied = validate_history(conn, migrations)?;
    if applied != migrations.len() {
        return Err(migration_conflict(format!(
            "database is not at head ({} of {} migrations applied); upgrade first",
            applied,
            migrations.len()
        ))
        .with_op("migrations_autogenerate"));
    }

    let live = live_tables(conn)?;
    let ops = diff_schema(&live, declared)?;
    if ops.is_empty() {
        tracing::debug!("live schema matches declarations");
        return Ok(None);
    }

    let number = match migrations.last() {
        Some(last) => last.number()? + 1,
        None => 1,
    };
    let id = format!("{:03}_{}", number, slugify(message));

    let upgrade = render(&id, message, ops.iter().map(SchemaOp::describe), upgrade_sql(&ops));
    let downgrade = render(
        &id,
        message,
        ops.iter().rev().map(|op| op.reverse().describe()),
        downgrade_sql(&ops),
    );

    Ok(Some(MigrationScript {
        migration: Migration::new(id, upgrade, downgrade),
        message: message.to_string(),
        ops,
    }))
}

fn render(
    id: &str,
    message: &str,
    descriptions: impl Iterator<Item = String>,
    statements: Vec<String>,
) -> String {
    let mut sql = format!("-- {}: {}\n", id, message);
    for description in descriptions {
        sql.push_str(&format!("--   {}\n", description));
    }
    for statement in statements {
        sql.push('\n');
        sql.push_str(&statement);
        sql.push_str(";\n");
    }
    sql
}

/// Lowercase `message`, keeping ASCII alphanumerics separated by `_`
fn slugify(message: &str) -> String {
    let mut slug = String::new();
    for c in message.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "auto".to_string()
    } else {
        slug.to_string()
    }
}
