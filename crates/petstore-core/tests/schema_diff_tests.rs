#![allow(clippy::unwrap_used, clippy::expect_used)]

use petstore_core::errors::PetStoreError;
use petstore_core::schema::diff::{downgrade_sql, upgrade_sql};
use petstore_core::schema::{diff_schema, ColumnDef, Model, SchemaOp, TableDef};
use petstore_core::Pet;

/// A second declared table with indexed and unique columns
fn user_table() -> TableDef {
    TableDef::new(
        "user",
        vec![
            ColumnDef::integer("id").primary_key(),
            ColumnDef::string("username", 80).not_null().unique().index(),
            ColumnDef::string("email", 120).not_null().unique(),
            ColumnDef::boolean("is_active").default_value(true),
        ],
    )
}

#[test]
fn test_empty_database_creates_every_declared_table() {
    let ops = diff_schema(&[], &[Pet::table_def(), user_table()]).unwrap();

    let described: Vec<String> = ops.iter().map(SchemaOp::describe).collect();
    assert_eq!(
        described,
        vec![
            "create table pet",
            "create table user",
            "create index on user.username",
        ]
    );
}

#[test]
fn test_pet_table_ddl() {
    let ops = diff_schema(&[], &[Pet::table_def()]).unwrap();
    let sql = upgrade_sql(&ops);

    assert_eq!(sql.len(), 1);
    assert!(sql[0].contains("id INTEGER NOT NULL"));
    assert!(sql[0].contains("name VARCHAR(50) CHECK (length(name) <= 50)"));
    assert!(sql[0].contains("species TEXT"));
    assert!(sql[0].contains("PRIMARY KEY (id)"));
    assert_eq!(downgrade_sql(&ops), vec!["DROP TABLE pet".to_string()]);
}

#[test]
fn test_user_table_ddl_uses_unique_index_for_indexed_column() {
    let ops = diff_schema(&[Pet::table_def()], &[Pet::table_def(), user_table()]).unwrap();
    let sql = upgrade_sql(&ops);

    assert_eq!(sql.len(), 2);
    assert!(sql[0].contains("username VARCHAR(80) NOT NULL CHECK"));
    assert!(sql[0].contains("email VARCHAR(120) NOT NULL UNIQUE"));
    assert!(sql[0].contains("is_active BOOLEAN DEFAULT 1"));
    assert_eq!(
        sql[1],
        "CREATE UNIQUE INDEX ix_user_username ON user (username)"
    );

    // Index is dropped before its table
    assert_eq!(
        downgrade_sql(&ops),
        vec![
            "DROP INDEX ix_user_username".to_string(),
            "DROP TABLE user".to_string(),
        ]
    );
}

#[test]
fn test_added_nullable_column_is_reversible() {
    let mut declared = Pet::table_def();
    declared.columns.push(ColumnDef::integer("age").index());

    let ops = diff_schema(&[Pet::table_def()], &[declared]).unwrap();
    assert_eq!(
        upgrade_sql(&ops),
        vec![
            "ALTER TABLE pet ADD COLUMN age INTEGER".to_string(),
            "CREATE INDEX ix_pet_age ON pet (age)".to_string(),
        ]
    );
    assert_eq!(
        downgrade_sql(&ops),
        vec![
            "DROP INDEX ix_pet_age".to_string(),
            "ALTER TABLE pet DROP COLUMN age".to_string(),
        ]
    );
}

#[test]
fn test_removed_table_is_dropped_after_its_indexes() {
    let ops = diff_schema(&[Pet::table_def(), user_table()], &[Pet::table_def()]).unwrap();

    assert_eq!(
        ops.iter().map(SchemaOp::describe).collect::<Vec<_>>(),
        vec!["drop index on user.username", "drop table user"]
    );
    // Downgrade recreates the table, then its index
    let down = downgrade_sql(&ops);
    assert!(down[0].starts_with("CREATE TABLE user"));
    assert_eq!(
        down[1],
        "CREATE UNIQUE INDEX ix_user_username ON user (username)"
    );
}

#[test]
fn test_index_toggle_without_column_change() {
    let mut declared = Pet::table_def();
    declared.columns[2] = ColumnDef::text("species").index();

    let ops = diff_schema(&[Pet::table_def()], &[declared.clone()]).unwrap();
    assert_eq!(
        ops,
        vec![SchemaOp::CreateIndex {
            table: "pet".to_string(),
            column: "species".to_string(),
            unique: false,
        }]
    );

    let back = diff_schema(&[declared], &[Pet::table_def()]).unwrap();
    assert_eq!(back, vec![ops[0].reverse()]);
}

#[test]
fn test_not_null_column_without_default_cannot_be_added() {
    let mut declared = Pet::table_def();
    declared
        .columns
        .push(ColumnDef::string("owner", 40).not_null());

    let err = diff_schema(&[Pet::table_def()], &[declared]).unwrap_err();
    assert!(matches!(
        err,
        PetStoreError::UnsupportedSchemaChange { ref column, .. } if column == "owner"
    ));
}

#[test]
fn test_not_null_column_with_default_can_be_added() {
    let mut declared = Pet::table_def();
    declared
        .columns
        .push(ColumnDef::boolean("vaccinated").not_null().default_value(false));

    let ops = diff_schema(&[Pet::table_def()], &[declared]).unwrap();
    assert_eq!(
        upgrade_sql(&ops),
        vec![
            "ALTER TABLE pet ADD COLUMN vaccinated BOOLEAN NOT NULL DEFAULT 0 CHECK (vaccinated IN (0, 1))"
                .to_string()
        ]
    );
}

#[test]
fn test_nullability_change_is_unsupported() {
    let mut declared = Pet::table_def();
    declared.columns[2] = ColumnDef::text("species").not_null();

    let err = diff_schema(&[Pet::table_def()], &[declared]).unwrap_err();
    match err {
        PetStoreError::UnsupportedSchemaChange { table, reason, .. } => {
            assert_eq!(table, "pet");
            assert!(reason.contains("nullability"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_dropping_primary_key_column_is_unsupported() {
    let declared = TableDef::new(
        "pet",
        vec![ColumnDef::string("name", 50), ColumnDef::text("species")],
    );
    assert!(diff_schema(&[Pet::table_def()], &[declared]).is_err());
}

#[test]
fn test_diff_is_deterministic() {
    let extra = TableDef::new("a_extra", vec![ColumnDef::integer("id").primary_key()]);
    let live = [user_table(), extra, Pet::table_def()];

    let first = diff_schema(&live, &[Pet::table_def()]).unwrap();
    let second = diff_schema(&live, &[Pet::table_def()]).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0], SchemaOp::DropTable(live[1].clone()));
}
