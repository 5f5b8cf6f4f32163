use std::fmt;
use std::str::FromStr;

use super::predicate::Predicate;
use crate::errors::PetStoreError;
use crate::model::{PetColumn, Value};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: PetColumn,
    pub direction: Direction,
}

/// Scalar aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Number of non-null values
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn sql_name(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name().to_ascii_lowercase())
    }
}

impl FromStr for Aggregate {
    type Err = PetStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(Aggregate::Count),
            "sum" => Ok(Aggregate::Sum),
            "avg" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            other => Err(PetStoreError::UnknownAggregate {
                name: other.to_string(),
            }),
        }
    }
}

/// Storage-independent description of a read
///
/// Filters are conjunctive. Ordering always ends with `id ASC` unless the
/// caller already ordered by `id`, which makes every result order total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filters: Vec<Predicate>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// `WHERE` body, or `None` when unfiltered
    pub fn where_clause(&self, params: &mut Vec<Value>) -> Option<String> {
        match self.filters.as_slice() {
            [] => None,
            [single] => Some(single.to_sql(params)),
            many => Some(Predicate::And(many.to_vec()).to_sql(params)),
        }
    }

    /// `ORDER BY` body with the primary-key tie-break appended
    pub fn order_clause(&self) -> String {
        let mut terms: Vec<String> = self
            .order
            .iter()
            .map(|o| format!("{} {}", o.column.name(), o.direction.sql()))
            .collect();
        if !self.order.iter().any(|o| o.column == PetColumn::Id) {
            terms.push("id ASC".to_string());
        }
        terms.join(", ")
    }

    /// Full `SELECT` for the given columns
    pub fn select_sql(&self, table: &str, columns: &[&str]) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), table);
        if let Some(clause) = self.where_clause(&mut params) {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&self.order_clause());
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        (sql, params)
    }

    /// Aggregate over the rows this spec selects
    pub fn aggregate_sql(
        &self,
        table: &str,
        aggregate: Aggregate,
        column: PetColumn,
    ) -> (String, Vec<Value>) {
        let expr = format!("{}({})", aggregate.sql_name(), column.name());
        match self.limit {
            None => {
                let mut params = Vec::new();
                let mut sql = format!("SELECT {} FROM {}", expr, table);
                if let Some(clause) = self.where_clause(&mut params) {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clause);
                }
                (sql, params)
            }
            Some(_) => {
                let (inner, params) = self.select_sql(table, &[column.name()]);
                (format!("SELECT {} FROM ({})", expr, inner), params)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_primary_key() {
        let (sql, params) = QuerySpec::new().select_sql("pet", &["id", "name", "species"]);
        assert_eq!(sql, "SELECT id, name, species FROM pet ORDER BY id ASC");
        assert!(params.is_empty());
    }

    #[test]
    fn test_order_by_appends_tie_break() {
        let spec = QuerySpec {
            order: vec![OrderBy {
                column: PetColumn::Species,
                direction: Direction::Desc,
            }],
            ..QuerySpec::default()
        };
        assert_eq!(spec.order_clause(), "species DESC, id ASC");
    }

    #[test]
    fn test_order_by_id_has_no_duplicate_tie_break() {
        let spec = QuerySpec {
            order: vec![OrderBy {
                column: PetColumn::Id,
                direction: Direction::Desc,
            }],
            ..QuerySpec::default()
        };
        assert_eq!(spec.order_clause(), "id DESC");
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let spec = QuerySpec {
            filters: vec![PetColumn::Species.eq("Cat"), PetColumn::Name.like("W%")],
            limit: Some(1),
            ..QuerySpec::default()
        };
        let (sql, params) = spec.select_sql("pet", &["id"]);
        assert_eq!(
            sql,
            "SELECT id FROM pet WHERE (species = ? AND name LIKE ?) ORDER BY id ASC LIMIT 1"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_aggregate_sql() {
        let (sql, _) = QuerySpec::new().aggregate_sql("pet", Aggregate::Count, PetColumn::Id);
        assert_eq!(sql, "SELECT COUNT(id) FROM pet");

        let limited = QuerySpec {
            limit: Some(2),
            ..QuerySpec::default()
        };
        let (sql, _) = limited.aggregate_sql("pet", Aggregate::Max, PetColumn::Id);
        assert_eq!(
            sql,
            "SELECT MAX(id) FROM (SELECT id FROM pet ORDER BY id ASC LIMIT 2)"
        );
    }

    #[test]
    fn test_aggregate_from_str() {
        assert_eq!("COUNT".parse::<Aggregate>(), Ok(Aggregate::Count));
        assert!("median".parse::<Aggregate>().is_err());
    }
}
