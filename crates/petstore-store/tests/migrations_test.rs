// Integration tests for the migration runner: apply, move between
// revisions, history validation

use petstore_core::ExErrorKind;
use petstore_store::migrations::{
    apply_migrations, current_revision, downgrade, embedded_migrations, history, upgrade,
    Migration,
};
use rusqlite::Connection;

// Helper to create test DB
fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

/// Embedded set plus a second step adding a nullable column
fn two_step_migrations() -> Vec<Migration> {
    let mut migrations = embedded_migrations();
    migrations.push(Migration::new(
        "002_add_age",
        "ALTER TABLE pet ADD COLUMN age INTEGER;\n",
        "ALTER TABLE pet DROP COLUMN age;\n",
    ));
    migrations
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = setup_test_db();

    // When: Migrations are applied
    let result = apply_migrations(&mut conn);

    // Then: All migrations succeed
    assert!(
        result.is_ok(),
        "Migrations should succeed: {:?}",
        result.err()
    );

    // And: The pet table and the bookkeeping table exist
    let tables = get_table_names(&conn);
    assert_eq!(tables, vec!["pet".to_string(), "schema_version".to_string()]);
}

#[test]
fn test_migration_idempotency() {
    // Given: A database with migrations already applied
    let mut conn = setup_test_db();
    apply_migrations(&mut conn).unwrap();

    // When: Migrations are re-run
    let result = apply_migrations(&mut conn);

    // Then: Re-running succeeds without duplicate version entries
    assert!(result.is_ok(), "Re-running migrations should succeed");
    let version_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version_count, 1);
}

#[test]
fn test_checksum_is_recorded() {
    let mut conn = setup_test_db();
    apply_migrations(&mut conn).unwrap();

    let checksum: String = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?",
            ["001_create_pet"],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(checksum.len(), 64, "SHA256 checksum should be 64 hex chars");
}

#[test]
fn test_upgrade_and_downgrade_between_revisions() {
    let mut conn = setup_test_db();
    let migrations = two_step_migrations();

    let applied = upgrade(&mut conn, &migrations, Some("001_create_pet")).unwrap();
    assert_eq!(applied, vec!["001_create_pet".to_string()]);
    assert!(!column_exists(&conn, "pet", "age"));

    let applied = upgrade(&mut conn, &migrations, None).unwrap();
    assert_eq!(applied, vec!["002_add_age".to_string()]);
    assert!(column_exists(&conn, "pet", "age"));
    assert_eq!(
        current_revision(&conn).unwrap().as_deref(),
        Some("002_add_age")
    );

    let reverted = downgrade(&mut conn, &migrations, Some("001_create_pet")).unwrap();
    assert_eq!(reverted, vec!["002_add_age".to_string()]);
    assert!(!column_exists(&conn, "pet", "age"));

    let reverted = downgrade(&mut conn, &migrations, None).unwrap();
    assert_eq!(reverted, vec!["001_create_pet".to_string()]);
    assert_eq!(get_table_names(&conn), vec!["schema_version".to_string()]);
    assert_eq!(current_revision(&conn).unwrap(), None);
}

#[test]
fn test_downgrade_keeps_rows_of_surviving_tables() {
    let mut conn = setup_test_db();
    let migrations = two_step_migrations();
    upgrade(&mut conn, &migrations, None).unwrap();
    conn.execute(
        "INSERT INTO pet (name, species, age) VALUES ('Fido', 'Dog', 3)",
        [],
    )
    .unwrap();

    downgrade(&mut conn, &migrations, Some("001_create_pet")).unwrap();

    let name: String = conn
        .query_row("SELECT name FROM pet", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "Fido");
}

#[test]
fn test_history_reports_applied_state() {
    let mut conn = setup_test_db();
    let migrations = two_step_migrations();
    upgrade(&mut conn, &migrations, Some("001_create_pet")).unwrap();

    let entries = history(&conn, &migrations).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_applied());
    assert!(entries[0].is_current);
    assert!(!entries[1].is_applied());
    assert!(!entries[1].is_current);
}

#[test]
fn test_checksum_drift_is_a_conflict() {
    let mut conn = setup_test_db();
    apply_migrations(&mut conn).unwrap();

    let mut edited = embedded_migrations();
    edited[0].upgrade.push_str("\n-- edited after being applied\n");

    let err = upgrade(&mut conn, &edited, None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::MigrationConflict);
}

#[test]
fn test_unknown_applied_migration_is_a_conflict() {
    let mut conn = setup_test_db();
    apply_migrations(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES ('009_elsewhere', 0, 'x')",
        [],
    )
    .unwrap();

    let err = upgrade(&mut conn, &embedded_migrations(), None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::MigrationConflict);
    assert!(history(&conn, &embedded_migrations()).is_err());
}

#[test]
fn test_unknown_target_is_invalid_input() {
    let mut conn = setup_test_db();
    let err = upgrade(&mut conn, &embedded_migrations(), Some("042_nope")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidInput);
}

#[test]
fn test_wrong_direction_is_rejected() {
    let mut conn = setup_test_db();
    let migrations = two_step_migrations();
    upgrade(&mut conn, &migrations, None).unwrap();

    assert!(upgrade(&mut conn, &migrations, Some("001_create_pet")).is_err());
    downgrade(&mut conn, &migrations, Some("001_create_pet")).unwrap();
    assert!(downgrade(&mut conn, &migrations, Some("002_add_age")).is_err());
}

#[test]
fn test_failing_step_is_rolled_back() {
    let mut conn = setup_test_db();
    let mut migrations = embedded_migrations();
    migrations.push(Migration::new(
        "002_broken",
        "CREATE TABLE extra (id INTEGER);\nTHIS IS NOT SQL;\n",
        "DROP TABLE extra;\n",
    ));

    let err = upgrade(&mut conn, &migrations, None).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Persistence);

    // The first step stays, the broken step leaves no trace
    assert_eq!(
        current_revision(&conn).unwrap().as_deref(),
        Some("001_create_pet")
    );
    assert!(!get_table_names(&conn).contains(&"extra".to_string()));
}

// Helper function to get all table names from the database
fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .unwrap();

    let tables = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();

    tables
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        > 0
}
