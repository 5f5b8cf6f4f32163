//! Error handling for petstore-store
//!
//! Wraps petstore-core ExError with store-specific helpers

use petstore_core::errors::{ExError, ExErrorKind};
use rusqlite::ErrorCode;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration step error, keeping the SQLite failure as source
pub fn migration_error(migration_id: &str, err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_entity_id(migration_id)
        .with_message(format!("Migration {} failed", migration_id))
        .with_source(from_rusqlite(err))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::MigrationConflict)
        .with_op("migration_checksum")
        .with_entity_id(migration_id)
        .with_message(format!(
            "Checksum mismatch for migration {}: recorded {}, script has {}",
            migration_id, expected, actual
        ))
}

/// Create a schema history conflict error
pub fn migration_conflict(reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::MigrationConflict)
        .with_op("migration")
        .with_message(reason)
}

/// Create an unknown-revision error
pub fn unknown_revision(revision: &str) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("migration")
        .with_entity_id(revision)
        .with_message(format!("Unknown revision {}", revision))
}

/// Create an error for a revision target on the wrong side of the current one
pub fn invalid_target(operation: &str, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op(operation.to_string())
        .with_message(reason)
}

/// Create a database error from rusqlite::Error
///
/// Constraint failures (CHECK, UNIQUE, NOT NULL, ...) are classified as
/// `ConstraintViolation`; everything else is `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            ExErrorKind::ConstraintViolation
        }
        _ => ExErrorKind::Persistence,
    };
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_constraint_failure_is_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT CHECK (length(v) <= 2))")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t (v) VALUES ('abc')", [])
            .unwrap_err();

        let ex_err = from_rusqlite(err);
        assert_eq!(ex_err.kind(), ExErrorKind::ConstraintViolation);
        assert!(ex_err.message().contains("CHECK constraint failed"));
    }

    #[test]
    fn test_other_failures_are_persistence() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", []).unwrap_err();
        assert_eq!(from_rusqlite(err).kind(), ExErrorKind::Persistence);
    }

    #[test]
    fn test_migration_error_keeps_source() {
        let err = migration_error("002_broken", rusqlite::Error::InvalidQuery);
        assert_eq!(err.entity_id(), Some("002_broken"));
        assert!(err.source_error().is_some());
    }
}
