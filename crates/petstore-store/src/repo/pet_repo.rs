//! SQLite repository for pets
//!
//! Stateless statement helpers. Every function takes a `&Connection`, so
//! the session can call them on a `Transaction` as well.

use petstore_core::model::{Pet, PetColumn, PetId, Value};
use petstore_core::query::{Aggregate, QuerySpec};
use petstore_core::schema::Model;
use petstore_core::PetStoreError;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::errors::{from_rusqlite, Result};

const SELECT_COLUMNS: [&str; 3] = ["id", "name", "species"];

/// SQLite repository for pets
pub struct PetRepo;

impl PetRepo {
    /// Insert a transient pet and return the generated key
    pub fn insert(conn: &Connection, pet: &Pet) -> Result<PetId> {
        conn.execute(
            "INSERT INTO pet (name, species) VALUES (?1, ?2)",
            rusqlite::params![pet.name, pet.species],
        )
        .map_err(from_rusqlite)?;

        Ok(PetId::new(conn.last_insert_rowid()))
    }

    /// Write the given columns of a persisted pet
    ///
    /// A row that no longer exists is reported as `NotFound`.
    pub fn update(conn: &Connection, id: PetId, pet: &Pet, columns: &[PetColumn]) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }

        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", c.name(), i + 1))
            .collect();
        let mut params: Vec<SqlValue> = columns.iter().map(|c| to_sql(&pet.value_of(*c))).collect();
        params.push(SqlValue::Integer(id.get()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            Pet::TABLE,
            assignments.join(", "),
            params.len()
        );
        let changed = conn
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(from_rusqlite)?;

        if changed == 0 {
            return Err(PetStoreError::PetNotFound { pet_id: id.get() }.into());
        }
        Ok(())
    }

    /// Delete one row; returns the number of rows removed (0 or 1)
    pub fn delete(conn: &Connection, id: PetId) -> Result<usize> {
        conn.execute("DELETE FROM pet WHERE id = ?1", [id.get()])
            .map_err(from_rusqlite)
    }

    /// Delete every row; returns the number of rows removed
    pub fn delete_all(conn: &Connection) -> Result<usize> {
        conn.execute("DELETE FROM pet", []).map_err(from_rusqlite)
    }

    /// Look up one row by key
    pub fn find(conn: &Connection, id: PetId) -> Result<Option<Pet>> {
        conn.query_row(
            "SELECT id, name, species FROM pet WHERE id = ?1",
            [id.get()],
            row_to_pet,
        )
        .optional()
        .map_err(from_rusqlite)
    }

    /// Every stored key, ascending
    pub fn ids(conn: &Connection) -> Result<Vec<PetId>> {
        let mut stmt = conn
            .prepare("SELECT id FROM pet ORDER BY id")
            .map_err(from_rusqlite)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0).map(PetId::new))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(ids)
    }

    pub fn count_all(conn: &Connection) -> Result<usize> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM pet", [], |row| row.get(0))
            .map_err(from_rusqlite)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Rows matching `spec`, in its order
    pub fn select(conn: &Connection, spec: &QuerySpec) -> Result<Vec<Pet>> {
        let (sql, params) = spec.select_sql(Pet::TABLE, &SELECT_COLUMNS);
        tracing::debug!(sql = %sql, params = params.len(), "select");

        let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
        let params: Vec<SqlValue> = params.iter().map(to_sql).collect();
        let pets = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), row_to_pet)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(pets)
    }

    /// Scalar aggregate over the rows matching `spec`
    pub fn aggregate(
        conn: &Connection,
        spec: &QuerySpec,
        aggregate: Aggregate,
        column: PetColumn,
    ) -> Result<Value> {
        let (sql, params) = spec.aggregate_sql(Pet::TABLE, aggregate, column);
        tracing::debug!(sql = %sql, params = params.len(), "aggregate");

        let params: Vec<SqlValue> = params.iter().map(to_sql).collect();
        let value: SqlValue = conn
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get(0)
            })
            .map_err(from_rusqlite)?;
        Ok(from_sql(value))
    }
}

fn row_to_pet(row: &Row<'_>) -> rusqlite::Result<Pet> {
    Ok(Pet::persisted(
        PetId::new(row.get(0)?),
        row.get(1)?,
        row.get(2)?,
    ))
}

/// Convert a domain value into a bound SQLite parameter
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
    }
}

/// Convert a SQLite result value into a domain value
pub fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(v),
        SqlValue::Real(v) => Value::Real(v),
        SqlValue::Text(v) => Value::Text(v),
        SqlValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
