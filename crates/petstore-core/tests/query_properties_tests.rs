//! Property tests for predicate compilation and change detection

use petstore_core::model::{Pet, PetColumn, PetId, Value};
use petstore_core::query::{Predicate, QuerySpec};
use proptest::prelude::*;

fn column() -> impl Strategy<Value = PetColumn> {
    prop_oneof![
        Just(PetColumn::Id),
        Just(PetColumn::Name),
        Just(PetColumn::Species),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i64>().prop_map(Value::Integer),
        "[A-Za-z]{0,12}".prop_map(Value::Text),
    ]
}

fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

proptest! {
    #[test]
    fn equality_conjunction_binds_one_param_per_non_null(
        conditions in prop::collection::vec((column(), value()), 0..6)
    ) {
        let mut params = Vec::new();
        let sql = Predicate::all_equal(&conditions).to_sql(&mut params);

        let non_null = conditions.iter().filter(|(_, v)| !v.is_null()).count();
        prop_assert_eq!(params.len(), non_null);
        prop_assert_eq!(placeholders(&sql), non_null);
    }

    #[test]
    fn select_always_ends_with_total_order(
        conditions in prop::collection::vec((column(), value()), 0..4),
        limit in prop::option::of(0u64..100)
    ) {
        let spec = QuerySpec {
            filters: vec![Predicate::all_equal(&conditions)],
            limit,
            ..QuerySpec::default()
        };
        let (sql, params) = spec.select_sql("pet", &["id", "name", "species"]);
        prop_assert!(sql.contains("ORDER BY id ASC"));
        prop_assert_eq!(placeholders(&sql), params.len());
    }

    #[test]
    fn changed_columns_reports_exactly_the_differing_fields(
        name_a in prop::option::of("[a-z]{0,8}"),
        name_b in prop::option::of("[a-z]{0,8}"),
        species_a in prop::option::of("[a-z]{0,8}"),
        species_b in prop::option::of("[a-z]{0,8}")
    ) {
        let snapshot = Pet::persisted(PetId::new(1), name_a.clone(), species_a.clone());
        let current = Pet::persisted(PetId::new(1), name_b.clone(), species_b.clone());

        let changed = current.changed_columns(&snapshot);
        prop_assert_eq!(changed.contains(&PetColumn::Name), name_a != name_b);
        prop_assert_eq!(changed.contains(&PetColumn::Species), species_a != species_b);
        prop_assert!(!changed.contains(&PetColumn::Id));
    }
}
