//! Query description: predicates, ordering, aggregates
//!
//! Everything here is storage-independent; the store crate executes a
//! `QuerySpec` against SQLite.

pub mod predicate;
pub mod spec;

pub use predicate::{CompareOp, Predicate};
pub use spec::{Aggregate, Direction, OrderBy, QuerySpec};
