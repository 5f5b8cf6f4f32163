// Integration tests for the unit of work: staging, commit atomicity,
// dirty tracking, identity map, rollback

use petstore_core::{ExErrorKind, Pet, PetId, StoreConfig};
use petstore_store::{Database, RecordState};
use tempfile::TempDir;

fn fresh_db() -> Database {
    Database::open_in_memory().expect("in-memory database")
}

/// Insert pets and return their generated keys
fn seed(db: &mut Database, pets: &[(&str, &str)]) -> Vec<PetId> {
    let mut session = db.session();
    let tickets: Vec<_> = pets
        .iter()
        .map(|(name, species)| session.stage_insert(Pet::new(*name, *species)).unwrap())
        .collect();
    let summary = session.commit().unwrap();
    tickets
        .into_iter()
        .map(|t| summary.id_of(t).unwrap())
        .collect()
}

fn stored_name(db: &Database, id: PetId) -> Option<String> {
    db.connection()
        .query_row("SELECT name FROM pet WHERE id = ?1", [id.get()], |row| {
            row.get(0)
        })
        .unwrap()
}

#[test]
fn test_uncommitted_record_has_no_primary_key() {
    let mut db = fresh_db();
    let mut session = db.session();

    let pet = Pet::new("Fido", "Dog");
    assert_eq!(pet.id(), None);

    let ticket = session.stage_insert(pet).unwrap();
    assert_eq!(session.pending(ticket).and_then(Pet::id), None);
    assert!(session.pending(ticket).unwrap().is_transient());
}

#[test]
fn test_committed_keys_are_positive_and_unique() {
    let mut db = fresh_db();

    let ids = seed(&mut db, &[("Fido", "Dog"), ("Whiskers", "Cat"), ("Nemo", "Fish")]);

    assert!(ids.iter().all(|id| id.get() > 0));
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_staging_a_persisted_record_is_invalid_state() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    let fido = session.get_by_id(ids[0]).unwrap().unwrap().clone();
    let err = session.stage_insert(fido).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::InvalidState);
}

#[test]
fn test_get_by_id_of_unassigned_key_is_none() {
    let mut db = fresh_db();
    seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    assert!(session.get_by_id(PetId::new(999)).unwrap().is_none());
    assert!(session.get_by_id(PetId::new(-1)).unwrap().is_none());
}

#[test]
fn test_stage_delete_of_unknown_key_is_not_found() {
    let mut db = fresh_db();
    let mut session = db.session();

    let err = session.stage_delete(PetId::new(42)).unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(session.staged_len(), 0);
}

#[test]
fn test_mutation_is_invisible_until_commit() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog")]);
    let id = ids[0];

    {
        let mut session = db.session();
        let fido = session.get_by_id(id).unwrap().unwrap();
        fido.name = Some("Rex".to_string());
        assert!(session.is_dirty(id));
        assert_eq!(session.state_of(id), Some(RecordState::PersistentDirty));
        // Session dropped without commit
    }
    assert_eq!(stored_name(&db, id).as_deref(), Some("Fido"));

    {
        let mut session = db.session();
        session.get_by_id(id).unwrap().unwrap().name = Some("Rex".to_string());
        let summary = session.commit().unwrap();
        assert_eq!(summary.updated, vec![id]);
        assert!(!session.is_dirty(id));
        assert_eq!(session.state_of(id), Some(RecordState::Persistent));
    }
    assert_eq!(stored_name(&db, id).as_deref(), Some("Rex"));
}

#[test]
fn test_failing_commit_leaves_storage_and_session_untouched() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog"), ("Whiskers", "Cat")]);

    {
        let mut session = db.session();
        session.get_by_id(ids[0]).unwrap().unwrap().name = Some("Rex".to_string());
        session.stage_delete(ids[1]).unwrap();
        let ticket = session.stage_insert(Pet::new("x".repeat(51), "Dog")).unwrap();

        let err = session.commit().unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);

        // Session state is exactly as before the attempt
        assert!(session.is_dirty(ids[0]));
        assert_eq!(session.state_of(ids[1]), Some(RecordState::Deleted));
        assert_eq!(session.staged_len(), 2);
        assert!(session.pending(ticket).is_some());

        session.rollback();
        assert!(!session.is_dirty(ids[0]));
        assert_eq!(session.staged_len(), 0);
    }

    assert_eq!(stored_name(&db, ids[0]).as_deref(), Some("Fido"));
    assert_eq!(stored_name(&db, ids[1]).as_deref(), Some("Whiskers"));
    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM pet", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_retry_after_fixing_failed_commit() {
    let mut db = fresh_db();
    let mut session = db.session();
    let ticket = session.stage_insert(Pet::new("y".repeat(60), "Cat")).unwrap();

    assert!(session.commit().is_err());
    session.pending_mut(ticket).unwrap().name = Some("Tom".to_string());

    let summary = session.commit().unwrap();
    let id = summary.id_of(ticket).unwrap();
    assert_eq!(
        session.get_by_id(id).unwrap().unwrap().name.as_deref(),
        Some("Tom")
    );
}

#[test]
fn test_name_of_exactly_fifty_characters_is_accepted() {
    let mut db = fresh_db();
    let mut session = db.session();
    session.stage_insert(Pet::new("n".repeat(50), "Dog")).unwrap();
    assert_eq!(session.commit().unwrap().inserted.len(), 1);
}

#[test]
fn test_identity_map_returns_tracked_instance() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    session.get_by_id(ids[0]).unwrap().unwrap().species = Some("Wolf".to_string());

    // The stored row still says Dog, but the session answers with its instance
    let listed = session.query().fetch_all().unwrap();
    assert_eq!(listed[0].species.as_deref(), Some("Wolf"));
    assert_eq!(session.tracked_len(), 1);
}

#[test]
fn test_get_by_id_hits_identity_map_without_storage() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        database_url: dir.path().join("pets.db").to_string_lossy().into_owned(),
        auto_migrate: true,
        ..StoreConfig::default()
    };
    let mut db = Database::open(&config).unwrap();
    let mut other = Database::open(&config).unwrap();
    let ids = seed(&mut db, &[("Fido", "Dog")]);

    let mut session = db.session();
    assert!(session.get_by_id(ids[0]).unwrap().is_some());

    // Remove the row through another handle: the tracked instance still answers
    other
        .connection_mut()
        .execute("DELETE FROM pet WHERE id = ?1", [ids[0].get()])
        .unwrap();
    assert!(session.get_by_id(ids[0]).unwrap().is_some());

    // A fresh session goes to storage and finds nothing
    drop(session);
    assert!(db.session().get_by_id(ids[0]).unwrap().is_none());
}

#[test]
fn test_modifying_a_row_removed_elsewhere_fails_commit() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        database_url: dir.path().join("pets.db").to_string_lossy().into_owned(),
        auto_migrate: true,
        ..StoreConfig::default()
    };
    let mut db = Database::open(&config).unwrap();
    let other = Database::open(&config).unwrap();
    let ids = seed(&mut db, &[("Fido", "Dog")]);

    let mut session = db.session();
    session.get_by_id(ids[0]).unwrap().unwrap().name = Some("Rex".to_string());
    other
        .connection()
        .execute("DELETE FROM pet WHERE id = ?1", [ids[0].get()])
        .unwrap();

    let err = session.commit().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert!(session.is_dirty(ids[0]));
}

#[test]
fn test_delete_then_fetch_all() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog"), ("Whiskers", "Cat")]);
    let mut session = db.session();

    session.stage_delete(ids[0]).unwrap();
    assert!(session.get_by_id(ids[0]).unwrap().is_none());
    session.commit().unwrap();

    let remaining = session.query().fetch_all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name.as_deref(), Some("Whiskers"));
    assert_eq!(session.state_of(ids[0]), None);
}

#[test]
fn test_delete_all_returns_prior_count_and_empties_table() {
    let mut db = fresh_db();
    seed(&mut db, &[("Fido", "Dog"), ("Whiskers", "Cat"), ("Nemo", "Fish")]);
    let mut session = db.session();

    let pending = session.stage_insert(Pet::new("Late", "Cat")).unwrap();
    let removed = session.delete_all().unwrap();
    assert_eq!(removed, 3);
    assert!(session.pending(pending).is_none(), "earlier insert cancelled");

    let summary = session.commit().unwrap();
    assert_eq!(summary.deleted, 3);
    assert!(session.query().fetch_all().unwrap().is_empty());
    assert_eq!(session.query().count().unwrap(), 0);
}

#[test]
fn test_insert_after_delete_all_survives() {
    let mut db = fresh_db();
    seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    session.delete_all().unwrap();
    let ticket = session.stage_insert(Pet::new("Phoenix", "Bird")).unwrap();
    let summary = session.commit().unwrap();

    let all = session.query().fetch_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), summary.id_of(ticket));
}

#[test]
fn test_rollback_reverts_modifications_and_discards_staged() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    session.get_by_id(ids[0]).unwrap().unwrap().name = None;
    let ticket = session.stage_insert(Pet::new("Whiskers", "Cat")).unwrap();
    assert!(session.has_changes());

    session.rollback();

    assert!(!session.has_changes());
    assert!(session.pending(ticket).is_none());
    assert_eq!(
        session.get_by_id(ids[0]).unwrap().unwrap().name.as_deref(),
        Some("Fido")
    );
    assert!(session.commit().unwrap().is_empty());
}

#[test]
fn test_dirty_ids_are_ordered() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("A", "Cat"), ("B", "Cat"), ("C", "Cat")]);
    let mut session = db.session();

    for id in [ids[2], ids[0]] {
        session.get_by_id(id).unwrap().unwrap().species = Some("Dog".to_string());
    }
    session.get_by_id(ids[1]).unwrap();

    assert_eq!(session.dirty_ids(), vec![ids[0], ids[2]]);
}

#[test]
fn test_setting_a_field_back_is_not_dirty() {
    let mut db = fresh_db();
    let ids = seed(&mut db, &[("Fido", "Dog")]);
    let mut session = db.session();

    let fido = session.get_by_id(ids[0]).unwrap().unwrap();
    fido.name = Some("Rex".to_string());
    fido.name = Some("Fido".to_string());

    assert!(!session.is_dirty(ids[0]));
    assert!(session.commit().unwrap().updated.is_empty());
}
