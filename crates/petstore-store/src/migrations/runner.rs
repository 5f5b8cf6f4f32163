//! Migration runner
//!
//! Moves the database between revisions with checksums, history validation
//! and one transaction per step.

use chrono::{DateTime, TimeZone, Utc};
use petstore_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{
    checksum_mismatch, from_rusqlite, invalid_target, migration_conflict, migration_error,
    unknown_revision, Result,
};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{embedded_migrations, Migration};

/// A row of the `schema_version` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub migration_id: String,
    pub applied_at: i64,
    pub checksum: String,
}

/// One known migration and whether it is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl HistoryEntry {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Apply all pending embedded migrations to the database
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    upgrade(conn, &embedded_migrations(), None).map(|_| ())
}

/// Upgrade to `target`, or to the last migration when `None`
///
/// Returns the ids applied, in order. Already being at the target is a
/// no-op.
///
/// # Errors
///
/// Returns `MigrationConflict` when the recorded history disagrees with
/// `migrations`, `InvalidInput` for an unknown target or one that lies
/// behind the current revision, and `Persistence` when a step fails (that
/// step is rolled back; earlier steps stay applied).
pub fn upgrade(
    conn: &mut Connection,
    migrations: &[Migration],
    target: Option<&str>,
) -> Result<Vec<String>> {
    log_op_start!("migrations_upgrade", target = target.unwrap_or("head"));
    let start = std::time::Instant::now();

    let applied = upgrade_impl(conn, migrations, target).map_err(|e| {
        log_op_error!(
            "migrations_upgrade",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "migrations_upgrade",
        duration_ms = start.elapsed().as_millis() as u64,
        row_count = applied.len()
    );
    Ok(applied)
}

fn upgrade_impl(
    conn: &mut Connection,
    migrations: &[Migration],
    target: Option<&str>,
) -> Result<Vec<String>> {
    create_schema_version_table(conn)?;
    let applied_count = validate_history(conn, migrations)?;

    let target_count = match target {
        None => migrations.len(),
        Some(id) => position_of(migrations, id)? + 1,
    };
    if target_count < applied_count {
        return Err(invalid_target(
            "migrations_upgrade",
            format!(
                "target {} is behind the current revision; downgrade instead",
                target.unwrap_or_default()
            ),
        ));
    }

    let mut done = Vec::new();
    for migration in &migrations[applied_count..target_count] {
        apply_migration(conn, migration)?;
        done.push(migration.id.clone());
    }
    Ok(done)
}

/// Downgrade to `target`, or remove every migration when `None`
///
/// The target itself stays applied. Returns the ids reverted, most recent
/// first.
///
/// # Errors
///
/// Same conditions as [`upgrade`], mirrored.
pub fn downgrade(
    conn: &mut Connection,
    migrations: &[Migration],
    target: Option<&str>,
) -> Result<Vec<String>> {
    log_op_start!("migrations_downgrade", target = target.unwrap_or("base"));
    let start = std::time::Instant::now();

    let reverted = downgrade_impl(conn, migrations, target).map_err(|e| {
        log_op_error!(
            "migrations_downgrade",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "migrations_downgrade",
        duration_ms = start.elapsed().as_millis() as u64,
        row_count = reverted.len()
    );
    Ok(reverted)
}

fn downgrade_impl(
    conn: &mut Connection,
    migrations: &[Migration],
    target: Option<&str>,
) -> Result<Vec<String>> {
    create_schema_version_table(conn)?;
    let applied_count = validate_history(conn, migrations)?;

    let target_count = match target {
        None => 0,
        Some(id) => position_of(migrations, id)? + 1,
    };
    if target_count > applied_count {
        return Err(invalid_target(
            "migrations_downgrade",
            format!(
                "target {} is ahead of the current revision; upgrade instead",
                target.unwrap_or_default()
            ),
        ));
    }

    let mut done = Vec::new();
    for migration in migrations[target_count..applied_count].iter().rev() {
        revert_migration(conn, migration)?;
        done.push(migration.id.clone());
    }
    Ok(done)
}

/// Id of the most recently applied migration
pub fn current_revision(conn: &Connection) -> Result<Option<String>> {
    create_schema_version_table(conn)?;
    conn.query_row(
        "SELECT migration_id FROM schema_version ORDER BY id DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Every known migration with its applied state, oldest first
///
/// # Errors
///
/// Returns `MigrationConflict` when the recorded history disagrees with
/// `migrations`.
pub fn history(conn: &Connection, migrations: &[Migration]) -> Result<Vec<HistoryEntry>> {
    create_schema_version_table(conn)?;
    validate_history(conn, migrations)?;
    let applied = applied_migrations(conn)?;

    Ok(migrations
        .iter()
        .enumerate()
        .map(|(index, migration)| {
            let row = applied.get(index);
            HistoryEntry {
                id: migration.id.clone(),
                applied_at: row.and_then(|r| Utc.timestamp_opt(r.applied_at, 0).single()),
                is_current: row.is_some() && index + 1 == applied.len(),
            }
        })
        .collect())
}

/// Rows of `schema_version`, in application order
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    create_schema_version_table(conn)?;
    let mut stmt = conn
        .prepare("SELECT migration_id, applied_at, checksum FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                migration_id: row.get(0)?,
                applied_at: row.get(1)?,
                checksum: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Check that the applied migrations are a checksum-identical prefix of
/// `migrations`; returns how many are applied.
pub(crate) fn validate_history(conn: &Connection, migrations: &[Migration]) -> Result<usize> {
    let applied = applied_migrations(conn)?;

    if applied.len() > migrations.len() {
        return Err(migration_conflict(format!(
            "database has {} applied migrations but only {} are known",
            applied.len(),
            migrations.len()
        )));
    }

    for (row, migration) in applied.iter().zip(migrations) {
        if row.migration_id != migration.id {
            return Err(migration_conflict(format!(
                "applied migration {} does not match known migration {}",
                row.migration_id, migration.id
            )));
        }
        let actual = compute_checksum(&migration.upgrade);
        if row.checksum != actual {
            return Err(checksum_mismatch(&migration.id, &row.checksum, &actual));
        }
    }

    Ok(applied.len())
}

fn position_of(migrations: &[Migration], id: &str) -> Result<usize> {
    migrations
        .iter()
        .position(|m| m.id == id)
        .ok_or_else(|| unknown_revision(id))
}

/// Create the schema_version table if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    tracing::debug!(migration_id = %migration.id, "applying migration");
    let checksum = compute_checksum(&migration.upgrade);

    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(&migration.upgrade)
        .map_err(|e| migration_error(&migration.id, e))?;

    let now = Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        rusqlite::params![migration.id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;
    Ok(())
}

fn revert_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    tracing::debug!(migration_id = %migration.id, "reverting migration");

    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(&migration.downgrade)
        .map_err(|e| migration_error(&migration.id, e))?;
    tx.execute(
        "DELETE FROM schema_version WHERE migration_id = ?1",
        [&migration.id],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;
    Ok(())
}
