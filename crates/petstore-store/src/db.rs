//! Database connection management
//!
//! Provides the low-level connection helpers and the `Database` handle that
//! owns the connection for the lifetime of the application.

use petstore_core::config::{DatabaseTarget, StoreConfig};
use petstore_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;
use std::path::Path;

use crate::errors::{from_rusqlite, Result};
use crate::migrations;
use crate::session::Session;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Configure a connection
///
/// Foreign keys are always enforced. WAL journaling only applies to file
/// databases; SQLite keeps in-memory databases on the memory journal.
pub fn configure(conn: &Connection, wal: bool) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;

    if wal {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(from_rusqlite)?;
    }

    Ok(())
}

/// Explicit handle to the store
///
/// Every record operation goes through a [`Session`] borrowed from the
/// handle, so at most one session is active per handle.
pub struct Database {
    conn: Connection,
    config: StoreConfig,
    target: DatabaseTarget,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("target", &self.target)
            .field("track_modifications", &self.config.track_modifications)
            .finish()
    }
}

impl Database {
    /// Bind to the storage target named by `config`
    ///
    /// Runs pending embedded migrations when `auto_migrate` is set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unusable `database_url` and
    /// `Persistence` when SQLite cannot open or migrate the database.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        log_op_start!("db_open", database_url = config.database_url.as_str());
        let start = std::time::Instant::now();

        let db = Self::open_impl(config).map_err(|e| {
            log_op_error!(
                "db_open",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!("db_open", duration_ms = start.elapsed().as_millis() as u64);
        Ok(db)
    }

    fn open_impl(config: &StoreConfig) -> Result<Self> {
        let target = config.target()?;
        let mut conn = match &target {
            DatabaseTarget::InMemory => open_in_memory()?,
            DatabaseTarget::File(path) => open(path)?,
        };
        configure(&conn, matches!(target, DatabaseTarget::File(_)))?;

        if config.auto_migrate {
            migrations::apply_migrations(&mut conn)?;
        }

        Ok(Self {
            conn,
            config: config.clone(),
            target,
        })
    }

    /// Open a private in-memory database with the embedded schema applied
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreConfig {
            auto_migrate: true,
            ..StoreConfig::in_memory()
        })
    }

    /// Start a unit of work
    pub fn session(&mut self) -> Session<'_> {
        Session::new(&mut self.conn, self.config.track_modifications)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// Release the connection
    ///
    /// # Errors
    ///
    /// Returns `Persistence` when SQLite refuses to close (for example while
    /// statements are still outstanding).
    pub fn close(self) -> Result<()> {
        log_op_start!("db_close");
        let start = std::time::Instant::now();

        self.conn.close().map_err(|(_, err)| {
            let e = from_rusqlite(err);
            log_op_error!(
                "db_close",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!("db_close", duration_ms = start.elapsed().as_millis() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'pet'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
        assert_eq!(db.target(), &DatabaseTarget::InMemory);
        db.close().unwrap();
    }

    #[test]
    fn test_open_without_auto_migrate_leaves_schema_empty() {
        let db = Database::open(&StoreConfig::in_memory()).unwrap();
        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_open_rejects_foreign_scheme() {
        let config = StoreConfig {
            database_url: "postgres://localhost/pets".to_string(),
            ..StoreConfig::default()
        };
        let err = Database::open(&config).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_CONFIG");
    }

    #[test]
    fn test_configure_enables_foreign_keys() {
        let conn = open_in_memory().unwrap();
        configure(&conn, false).unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
