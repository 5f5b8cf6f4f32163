//! Composable boolean predicates over pet columns
//!
//! Predicates are plain data. They compile to a parameterised SQL fragment;
//! values always travel as bound parameters.
//!
//! ```
//! use petstore_core::model::PetColumn;
//!
//! let cats_named_w = PetColumn::Species
//!     .eq("Cat")
//!     .and(PetColumn::Name.like("W%"));
//! let mut params = Vec::new();
//! assert_eq!(
//!     cats_named_w.to_sql(&mut params),
//!     "(species = ? AND name LIKE ?)"
//! );
//! assert_eq!(params.len(), 2);
//! ```

use crate::model::{PetColumn, Value};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Boolean condition over the columns of one record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: PetColumn,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: PetColumn,
        pattern: String,
    },
    IsNull(PetColumn),
    IsNotNull(PetColumn),
    InList {
        column: PetColumn,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Predicate matching every row
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Conjunction of equality conditions
    ///
    /// An empty slice yields [`Predicate::always`]. `Value::Null` compares
    /// with `IS NULL`.
    pub fn all_equal(conditions: &[(PetColumn, Value)]) -> Self {
        Predicate::And(
            conditions
                .iter()
                .map(|(column, value)| (*column).eq(value.clone()))
                .collect(),
        )
    }

    /// Render as a SQL boolean expression, appending bound values to `params`
    pub fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Predicate::Compare { column, op, value } => match (op, value) {
                (CompareOp::Eq, Value::Null) => format!("{} IS NULL", column.name()),
                (CompareOp::Ne, Value::Null) => format!("{} IS NOT NULL", column.name()),
                _ => {
                    params.push(value.clone());
                    format!("{} {} ?", column.name(), op.sql())
                }
            },
            Predicate::Like { column, pattern } => {
                params.push(Value::Text(pattern.clone()));
                format!("{} LIKE ?", column.name())
            }
            Predicate::IsNull(column) => format!("{} IS NULL", column.name()),
            Predicate::IsNotNull(column) => format!("{} IS NOT NULL", column.name()),
            Predicate::InList { column, values } => {
                if values.is_empty() {
                    return "0".to_string();
                }
                let marks = vec!["?"; values.len()].join(", ");
                params.extend(values.iter().cloned());
                format!("{} IN ({})", column.name(), marks)
            }
            Predicate::And(parts) => join(parts, " AND ", "1", params),
            Predicate::Or(parts) => join(parts, " OR ", "0", params),
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql(params)),
        }
    }
}

fn join(parts: &[Predicate], sep: &str, empty: &str, params: &mut Vec<Value>) -> String {
    match parts {
        [] => empty.to_string(),
        [single] => single.to_sql(params),
        _ => {
            let rendered: Vec<String> = parts.iter().map(|p| p.to_sql(params)).collect();
            format!("({})", rendered.join(sep))
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

// Builders live on the column so call sites read like conditions.
impl PetColumn {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            column: self,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            column: self,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(self)
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self)
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::InList {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}
