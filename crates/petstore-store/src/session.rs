//! Unit of work over the `pet` table
//!
//! A `Session` stages inserts and deletes, tracks in-memory modifications of
//! the records it has loaded, and applies everything in one SQLite
//! transaction on [`Session::commit`]. Nothing reaches storage before then.
//!
//! Each loaded record lives once in the session's identity map; repeated
//! lookups and queries hand back that same tracked instance, including any
//! uncommitted modifications.
//!
//! ```
//! use petstore_core::Pet;
//! use petstore_store::Database;
//!
//! let mut db = Database::open_in_memory()?;
//! let mut session = db.session();
//!
//! let ticket = session.stage_insert(Pet::new("Fido", "Dog"))?;
//! let summary = session.commit()?;
//! let id = summary.id_of(ticket).expect("committed insert has an id");
//!
//! if let Some(fido) = session.get_by_id(id)? {
//!     fido.name = Some("Rex".to_string());
//! }
//! assert!(session.is_dirty(id));
//! session.commit()?;
//! # Ok::<(), petstore_core::ExError>(())
//! ```

use petstore_core::model::{Pet, PetColumn, PetId};
use petstore_core::petstore_core_types::schema::{
    EVENT_RECORD_DELETED, EVENT_RECORD_INSERTED, EVENT_RECORD_UPDATED,
};
use petstore_core::PetStoreError;
use petstore_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::{Connection, DropBehavior};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{from_rusqlite, Result};
use crate::query::Query;
use crate::repo::PetRepo;

/// Ticket for a staged insert
///
/// Resolves to the generated key through [`CommitSummary::id_of`] once the
/// insert is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StagedInsert(usize);

impl StagedInsert {
    /// Position of the insert among everything staged in this session
    pub fn slot(&self) -> usize {
        self.0
    }
}

/// Lifecycle state of a tracked record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Stored and identical to its last committed values
    Persistent,
    /// Stored, with in-memory modifications awaiting commit
    PersistentDirty,
    /// Stored, staged for deletion
    Deleted,
}

/// What a successful commit did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Generated keys, in staging order
    pub inserted: Vec<PetId>,
    /// Records whose modifications were written
    pub updated: Vec<PetId>,
    /// Rows removed by staged deletes
    pub deleted: usize,
    slots: Vec<usize>,
}

impl CommitSummary {
    /// Key generated for a staged insert of this commit
    pub fn id_of(&self, ticket: StagedInsert) -> Option<PetId> {
        self.slots
            .iter()
            .position(|slot| *slot == ticket.0)
            .map(|i| self.inserted[i])
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Inserted,
    Updated,
    Deleted,
}

/// One record change made by a commit (kept only with modification tracking)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModificationEvent {
    pub pet_id: PetId,
    pub kind: ModificationKind,
    /// Columns written; empty for deletes
    pub columns: Vec<PetColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagedOp {
    Insert(usize),
    Delete(PetId),
    DeleteAll,
}

#[derive(Debug)]
struct Tracked {
    pet: Pet,
    committed: Pet,
}

impl Tracked {
    fn new(pet: Pet) -> Self {
        Self {
            committed: pet.clone(),
            pet,
        }
    }

    fn changed_columns(&self) -> Vec<PetColumn> {
        self.pet.changed_columns(&self.committed)
    }
}

/// Result of the transactional part of a commit, applied to the session
/// only once the transaction is durable
struct Applied {
    summary: CommitSummary,
    updated_columns: Vec<(PetId, Vec<PetColumn>)>,
    deleted_ids: BTreeSet<PetId>,
    cleared: bool,
}

/// Unit of work bound to one connection
pub struct Session<'c> {
    conn: &'c mut Connection,
    track_modifications: bool,
    identity_map: BTreeMap<PetId, Tracked>,
    inserts: BTreeMap<usize, Pet>,
    next_slot: usize,
    staged: Vec<StagedOp>,
    last_modifications: Vec<ModificationEvent>,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c mut Connection, track_modifications: bool) -> Self {
        Self {
            conn,
            track_modifications,
            identity_map: BTreeMap::new(),
            inserts: BTreeMap::new(),
            next_slot: 0,
            staged: Vec::new(),
            last_modifications: Vec::new(),
        }
    }

    // ===== Staging =====

    /// Stage a transient pet for insertion
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the pet already has an identity.
    pub fn stage_insert(&mut self, pet: Pet) -> Result<StagedInsert> {
        if let Some(id) = pet.id() {
            return Err(PetStoreError::AlreadyPersisted { pet_id: id.get() }.into());
        }

        let slot = self.next_slot;
        self.next_slot += 1;
        self.inserts.insert(slot, pet);
        self.staged.push(StagedOp::Insert(slot));
        tracing::debug!(slot, "staged insert");
        Ok(StagedInsert(slot))
    }

    /// Stage a stored pet for deletion
    ///
    /// Staging a record that is already staged for deletion is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no pet with this key is stored.
    pub fn stage_delete(&mut self, id: PetId) -> Result<()> {
        if !self.identity_map.contains_key(&id) {
            let pet = PetRepo::find(self.conn, id)?
                .ok_or(PetStoreError::PetNotFound { pet_id: id.get() })?;
            self.identity_map.insert(id, Tracked::new(pet));
        }
        if self.is_pending_delete(id) {
            return Ok(());
        }

        self.staged.push(StagedOp::Delete(id));
        tracing::debug!(pet_id = id.get(), "staged delete");
        Ok(())
    }

    /// Stage removal of every stored pet
    ///
    /// Inserts staged earlier in this session are cancelled. Returns the
    /// number of stored rows the commit will remove.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the rows cannot be counted.
    pub fn delete_all(&mut self) -> Result<usize> {
        let count = PetRepo::count_all(self.conn)?;

        let cancelled = self.inserts.len();
        self.inserts.clear();
        self.staged.clear();
        self.staged.push(StagedOp::DeleteAll);
        tracing::debug!(row_count = count, cancelled, "staged delete all");
        Ok(count)
    }

    /// Staged insert, still transient
    pub fn pending(&self, ticket: StagedInsert) -> Option<&Pet> {
        self.inserts.get(&ticket.0)
    }

    /// Mutable access to a staged insert before it is committed
    pub fn pending_mut(&mut self, ticket: StagedInsert) -> Option<&mut Pet> {
        self.inserts.get_mut(&ticket.0)
    }

    /// Withdraw a staged insert
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the ticket no longer refers to a pending
    /// insert.
    pub fn cancel_insert(&mut self, ticket: StagedInsert) -> Result<Pet> {
        let pet = self
            .inserts
            .remove(&ticket.0)
            .ok_or(PetStoreError::UnknownStagedInsert { slot: ticket.0 })?;
        self.staged.retain(|op| *op != StagedOp::Insert(ticket.0));
        Ok(pet)
    }

    /// Number of staged operations
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Whether a commit would write anything
    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty() || self.identity_map.values().any(|t| t.pet != t.committed)
    }

    // ===== Identity map =====

    /// Look up a pet by key
    ///
    /// Tracked records are answered from the identity map without touching
    /// storage. A record staged for deletion reports `None`.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if storage cannot be read.
    pub fn get_by_id(&mut self, id: PetId) -> Result<Option<&mut Pet>> {
        if self.is_pending_delete(id) {
            return Ok(None);
        }
        if !self.identity_map.contains_key(&id) {
            match PetRepo::find(self.conn, id)? {
                Some(pet) => {
                    self.identity_map.insert(id, Tracked::new(pet));
                }
                None => return Ok(None),
            }
        }
        Ok(self.identity_map.get_mut(&id).map(|t| &mut t.pet))
    }

    /// Start a query over the stored pets
    pub fn query(&mut self) -> Query<'_, 'c> {
        Query::new(self)
    }

    /// State of a tracked record; `None` when the session does not track it
    pub fn state_of(&self, id: PetId) -> Option<RecordState> {
        let tracked = self.identity_map.get(&id)?;
        Some(if self.is_pending_delete(id) {
            RecordState::Deleted
        } else if tracked.pet != tracked.committed {
            RecordState::PersistentDirty
        } else {
            RecordState::Persistent
        })
    }

    /// Whether a tracked record differs from its last committed values
    pub fn is_dirty(&self, id: PetId) -> bool {
        self.identity_map
            .get(&id)
            .is_some_and(|t| t.pet != t.committed)
    }

    /// Keys of every dirty tracked record, ascending
    pub fn dirty_ids(&self) -> Vec<PetId> {
        self.identity_map
            .iter()
            .filter(|(_, t)| t.pet != t.committed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of records in the identity map
    pub fn tracked_len(&self) -> usize {
        self.identity_map.len()
    }

    /// Record changes made by the last successful commit
    ///
    /// Always empty unless modification tracking is enabled.
    pub fn last_modifications(&self) -> &[ModificationEvent] {
        &self.last_modifications
    }

    /// Run a read with the tracked modifications visible
    ///
    /// Dirty records are written inside a savepoint that is always rolled
    /// back, so the read sees them and storage never keeps them. Staged
    /// inserts and deletes are not applied.
    pub(crate) fn read_tracked<T, F>(&mut self, read: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let dirty: Vec<(PetId, Vec<PetColumn>)> = self
            .identity_map
            .iter()
            .map(|(id, t)| (*id, t.changed_columns()))
            .filter(|(_, columns)| !columns.is_empty())
            .collect();
        if dirty.is_empty() {
            return read(&*self.conn);
        }

        let mut savepoint = self.conn.savepoint().map_err(from_rusqlite)?;
        savepoint.set_drop_behavior(DropBehavior::Rollback);
        for (id, columns) in &dirty {
            if let Some(tracked) = self.identity_map.get(id) {
                PetRepo::update(&savepoint, *id, &tracked.pet, columns)?;
            }
        }
        tracing::debug!(dirty = dirty.len(), "read with tracked modifications");
        let result = read(&savepoint);
        savepoint.finish().map_err(from_rusqlite)?;
        result
    }

    /// Track loaded rows and hand back the identity-map entries, in row order
    ///
    /// A row whose key is already tracked resolves to the tracked instance.
    pub(crate) fn track_rows(&mut self, rows: Vec<Pet>) -> Vec<&mut Pet> {
        let order: Vec<PetId> = rows.iter().filter_map(Pet::id).collect();
        for row in rows {
            if let Some(id) = row.id() {
                self.identity_map
                    .entry(id)
                    .or_insert_with(|| Tracked::new(row));
            }
        }

        let wanted: BTreeSet<PetId> = order.iter().copied().collect();
        let mut entries: BTreeMap<PetId, &mut Pet> = self
            .identity_map
            .iter_mut()
            .filter(|(id, _)| wanted.contains(id))
            .map(|(id, tracked)| (*id, &mut tracked.pet))
            .collect();
        order.iter().filter_map(|id| entries.remove(id)).collect()
    }

    fn is_pending_delete(&self, id: PetId) -> bool {
        self.staged.iter().any(|op| match op {
            StagedOp::Delete(staged) => *staged == id,
            StagedOp::DeleteAll => true,
            StagedOp::Insert(_) => false,
        })
    }

    // ===== Commit / rollback =====

    /// Apply all staged operations and tracked modifications atomically
    ///
    /// Modifications are written first, then staged operations in staging
    /// order. On failure the transaction is rolled back and the session is
    /// left exactly as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` when storage rejects a row (for example a
    /// name longer than 50 characters), `NotFound` when a modified record
    /// was removed behind the session's back, `Persistence` otherwise.
    pub fn commit(&mut self) -> Result<CommitSummary> {
        log_op_start!("session_commit", staged = self.staged.len());
        let start = std::time::Instant::now();

        let applied = self.commit_impl().map_err(|e| {
            log_op_error!(
                "session_commit",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;
        let summary = self.finish_commit(applied);

        log_op_end!(
            "session_commit",
            duration_ms = start.elapsed().as_millis() as u64,
            inserted = summary.inserted.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted
        );
        Ok(summary)
    }

    fn commit_impl(&mut self) -> Result<Applied> {
        let updated_columns: Vec<(PetId, Vec<PetColumn>)> = self
            .identity_map
            .iter()
            .map(|(id, t)| (*id, t.changed_columns()))
            .filter(|(_, columns)| !columns.is_empty())
            .collect();

        let tx = self.conn.transaction().map_err(from_rusqlite)?;

        for (id, columns) in &updated_columns {
            if let Some(tracked) = self.identity_map.get(id) {
                PetRepo::update(&tx, *id, &tracked.pet, columns)?;
            }
        }

        let mut summary = CommitSummary {
            updated: updated_columns.iter().map(|(id, _)| *id).collect(),
            ..CommitSummary::default()
        };
        let mut deleted_ids = BTreeSet::new();
        let mut cleared = false;

        for op in &self.staged {
            match op {
                StagedOp::Insert(slot) => {
                    if let Some(pet) = self.inserts.get(slot) {
                        let id = PetRepo::insert(&tx, pet)?;
                        summary.inserted.push(id);
                        summary.slots.push(*slot);
                    }
                }
                StagedOp::Delete(id) => {
                    let removed = PetRepo::delete(&tx, *id)?;
                    if removed > 0 {
                        deleted_ids.insert(*id);
                    }
                    summary.deleted += removed;
                }
                StagedOp::DeleteAll => {
                    deleted_ids.extend(PetRepo::ids(&tx)?);
                    summary.deleted += PetRepo::delete_all(&tx)?;
                    cleared = true;
                }
            }
        }

        tx.commit().map_err(from_rusqlite)?;

        summary.updated.retain(|id| !deleted_ids.contains(id));

        Ok(Applied {
            summary,
            updated_columns,
            deleted_ids,
            cleared,
        })
    }

    /// Bring the in-memory state in line with a durable commit
    fn finish_commit(&mut self, applied: Applied) -> CommitSummary {
        let Applied {
            summary,
            updated_columns,
            deleted_ids,
            cleared,
        } = applied;

        if cleared {
            self.identity_map.clear();
        }
        for id in &deleted_ids {
            self.identity_map.remove(id);
        }
        for tracked in self.identity_map.values_mut() {
            tracked.committed = tracked.pet.clone();
        }
        for (slot, id) in summary.slots.iter().zip(&summary.inserted) {
            if let Some(pet) = self.inserts.remove(slot) {
                let stored = Pet::persisted(*id, pet.name, pet.species);
                self.identity_map.insert(*id, Tracked::new(stored));
            }
        }
        self.inserts.clear();
        self.staged.clear();

        self.last_modifications.clear();
        if self.track_modifications {
            self.record_modifications(&summary, updated_columns, deleted_ids);
        }
        summary
    }

    fn record_modifications(
        &mut self,
        summary: &CommitSummary,
        updated_columns: Vec<(PetId, Vec<PetColumn>)>,
        deleted_ids: BTreeSet<PetId>,
    ) {
        for (id, columns) in updated_columns {
            if deleted_ids.contains(&id) {
                continue;
            }
            tracing::debug!(
                op = "session_commit",
                event = EVENT_RECORD_UPDATED,
                pet_id = id.get(),
                columns = ?columns
            );
            self.last_modifications.push(ModificationEvent {
                pet_id: id,
                kind: ModificationKind::Updated,
                columns,
            });
        }
        for id in &summary.inserted {
            tracing::debug!(
                op = "session_commit",
                event = EVENT_RECORD_INSERTED,
                pet_id = id.get()
            );
            self.last_modifications.push(ModificationEvent {
                pet_id: *id,
                kind: ModificationKind::Inserted,
                columns: PetColumn::MUTABLE.to_vec(),
            });
        }
        for id in deleted_ids {
            tracing::debug!(
                op = "session_commit",
                event = EVENT_RECORD_DELETED,
                pet_id = id.get()
            );
            self.last_modifications.push(ModificationEvent {
                pet_id: id,
                kind: ModificationKind::Deleted,
                columns: Vec::new(),
            });
        }
    }

    /// Discard staged operations and revert tracked modifications
    pub fn rollback(&mut self) {
        let discarded = self.staged.len();
        let reverted = self.dirty_ids().len();

        self.staged.clear();
        self.inserts.clear();
        for tracked in self.identity_map.values_mut() {
            tracked.pet = tracked.committed.clone();
        }
        tracing::debug!(discarded, reverted, "session rolled back");
    }
}
