//! Query facade over a session
//!
//! Builder-style reads. Filters, ordering and aggregates see the session's
//! tracked modifications; staged inserts and deletes become visible after
//! `commit`. Rows come back as handles into the session's identity map, so
//! a field changed on a fetched record is written by the next commit.

use petstore_core::model::{Pet, PetColumn, Value};
use petstore_core::query::{Aggregate, Direction, OrderBy, Predicate, QuerySpec};

use crate::errors::Result;
use crate::repo::PetRepo;
use crate::session::Session;

/// A read under construction
pub struct Query<'s, 'c> {
    session: &'s mut Session<'c>,
    spec: QuerySpec,
}

impl<'s, 'c> Query<'s, 'c> {
    pub(crate) fn new(session: &'s mut Session<'c>) -> Self {
        Self {
            session,
            spec: QuerySpec::new(),
        }
    }

    /// Keep rows matching `predicate` (conjunctive with earlier filters)
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.spec.filters.push(predicate);
        self
    }

    /// Keep rows where every column equals its value
    ///
    /// No conditions keep every row. `Value::Null` matches NULL columns.
    pub fn filter_by(mut self, conditions: &[(PetColumn, Value)]) -> Self {
        if !conditions.is_empty() {
            self.spec.filters.push(Predicate::all_equal(conditions));
        }
        self
    }

    /// Sort ascending by `column`; ties fall back to the primary key
    pub fn order_by(mut self, column: PetColumn) -> Self {
        self.spec.order.push(OrderBy {
            column,
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_by_desc(mut self, column: PetColumn) -> Self {
        self.spec.order.push(OrderBy {
            column,
            direction: Direction::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Every matching row
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if storage cannot be read, or the error a commit
    /// would raise for a tracked modification (`ConstraintViolation`,
    /// `NotFound` for a row removed elsewhere).
    pub fn fetch_all(self) -> Result<Vec<&'s mut Pet>> {
        let Query { session, spec } = self;
        let rows = session.read_tracked(|conn| PetRepo::select(conn, &spec))?;
        Ok(session.track_rows(rows))
    }

    /// First matching row under the current ordering
    ///
    /// # Errors
    ///
    /// Same as [`Query::fetch_all`].
    pub fn fetch_first(self) -> Result<Option<&'s mut Pet>> {
        Ok(self.limit(1).fetch_all()?.into_iter().next())
    }

    /// Aggregate `column` over the matching rows
    ///
    /// `Count` of an empty selection is `0`; the other functions yield
    /// `Value::Null` there.
    ///
    /// # Errors
    ///
    /// Same as [`Query::fetch_all`].
    pub fn aggregate(self, aggregate: Aggregate, column: PetColumn) -> Result<Value> {
        let Query { session, spec } = self;
        session.read_tracked(|conn| PetRepo::aggregate(conn, &spec, aggregate, column))
    }

    /// Number of matching rows
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if storage cannot be read.
    pub fn count(self) -> Result<usize> {
        let value = self.aggregate(Aggregate::Count, PetColumn::Id)?;
        Ok(value
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or_default())
    }
}
