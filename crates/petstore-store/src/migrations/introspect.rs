//! Live schema introspection
//!
//! Reads the current SQLite schema back into `TableDef`s through the
//! `pragma_table_info` / `pragma_index_list` table-valued functions.
//! Bookkeeping tables (`schema_version`, `sqlite_*`) are skipped.

use petstore_core::model::Value;
use petstore_core::schema::table::index_name;
use petstore_core::schema::{ColumnDef, ColumnType, TableDef};
use rusqlite::Connection;

use crate::errors::{from_rusqlite, migration_conflict, Result};

/// Every user table of the database, ordered by name
pub fn live_tables(conn: &Connection) -> Result<Vec<TableDef>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != 'schema_version'
             ORDER BY name",
        )
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    names.iter().map(|name| live_table(conn, name)).collect()
}

/// One table as currently stored
pub fn live_table(conn: &Connection, table: &str) -> Result<TableDef> {
    let mut stmt = conn
        .prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk
             FROM pragma_table_info(?1) ORDER BY cid",
        )
        .map_err(from_rusqlite)?;
    let raw = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut columns = Vec::with_capacity(raw.len());
    for (name, declared_type, not_null, default, pk) in raw {
        let ty = ColumnType::from_sql_type(&declared_type).ok_or_else(|| {
            migration_conflict(format!(
                "column {}.{} has unsupported type '{}'",
                table, name, declared_type
            ))
        })?;
        columns.push(ColumnDef {
            name,
            ty,
            primary_key: pk > 0,
            nullable: not_null == 0 && pk == 0,
            unique: false,
            index: false,
            default: default.as_deref().map(parse_default),
        });
    }

    for (index, unique, origin) in index_list(conn, table)? {
        if origin == "pk" {
            continue;
        }
        let column_name = single_index_column(conn, table, &index)?;
        let column = columns
            .iter_mut()
            .find(|c| c.name == column_name)
            .ok_or_else(|| {
                migration_conflict(format!("index {} refers to unknown column", index))
            })?;

        if origin == "u" {
            column.unique = true;
        } else {
            if index != index_name(table, &column_name) {
                return Err(migration_conflict(format!(
                    "index {} does not follow the ix_<table>_<column> naming",
                    index
                )));
            }
            column.index = true;
            column.unique = column.unique || unique;
        }
    }

    Ok(TableDef::new(table, columns))
}

fn index_list(conn: &Connection, table: &str) -> Result<Vec<(String, bool, String)>> {
    let mut stmt = conn
        .prepare("SELECT name, \"unique\", origin FROM pragma_index_list(?1) ORDER BY name")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)? != 0,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn single_index_column(conn: &Connection, table: &str, index: &str) -> Result<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
        .map_err(from_rusqlite)?;
    let columns = stmt
        .query_map([index], |row| row.get::<_, Option<String>>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    match columns.as_slice() {
        [Some(column)] => Ok(column.clone()),
        _ => Err(migration_conflict(format!(
            "index {} on {} is not a single-column index",
            index, table
        ))),
    }
}

/// Interpret a `dflt_value` as reported by SQLite (the literal SQL text)
fn parse_default(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::Text(inner.replace("''", "'"));
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Real(f);
    }
    Value::Text(trimmed.to_string())
}
