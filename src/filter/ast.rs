//! Filter and ordering structures
//!
//! Defines the predicate tree that lists, cursor bounds and keyed lookups
//! compile down to before a statement is sent to an endpoint.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Entry, Value};

/// A column an entry can be filtered or ordered by
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// The identifier column
    Id,
    /// The shard key column
    Shard,
    /// A named entry field
    Field(String),
}

impl Column {
    /// Reads this column from an entry. Missing values read as `Null`.
    pub fn read(&self, entry: &Entry) -> Value {
        match self {
            Column::Id => entry.id.map(Value::from).unwrap_or(Value::Null),
            Column::Shard => Value::Text(entry.shard.as_str().to_string()),
            Column::Field(name) => entry.get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Id => write!(f, "<id>"),
            Column::Shard => write!(f, "<shard>"),
            Column::Field(name) => write!(f, "{}", name),
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equality: column = value
    #[serde(rename = "eq")]
    Eq,
    /// Inequality: column != value
    #[serde(rename = "neq")]
    Neq,
    /// Greater than: column > value
    #[serde(rename = "gt")]
    Gt,
    /// Greater than or equal: column >= value
    #[serde(rename = "gte")]
    Gte,
    /// Less than: column < value
    #[serde(rename = "lt")]
    Lt,
    /// Less than or equal: column <= value
    #[serde(rename = "lte")]
    Lte,
}

impl CompareOp {
    /// Returns the operator symbol for explain output
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Applies the operator to the ordering of `actual` relative to the bound.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Neq => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A single predicate (column + operation + value)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Column being compared
    pub column: Column,
    /// Comparison operator
    pub op: CompareOp,
    /// Right-hand side value
    pub value: Value,
}

impl Predicate {
    /// Create a predicate
    pub fn new(column: Column, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column,
            op,
            value: value.into(),
        }
    }

    /// Create an equality predicate
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    /// Create a strict "beyond" predicate in the given direction (`>` or `<`)
    pub fn beyond(column: Column, direction: SortDirection, value: impl Into<Value>) -> Self {
        let op = match direction {
            SortDirection::Asc => CompareOp::Gt,
            SortDirection::Desc => CompareOp::Lt,
        };
        Self::new(column, op, value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op.symbol(), self.value)
    }
}

/// Boolean filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every entry
    All,
    /// A single comparison
    Predicate(Predicate),
    /// All children must match
    And(Vec<Filter>),
    /// At least one child must match
    Or(Vec<Filter>),
}

impl Filter {
    /// Conjunction of two filters, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Conjunction of a list of predicates.
    pub fn all_of(predicates: impl IntoIterator<Item = Predicate>) -> Filter {
        predicates
            .into_iter()
            .fold(Filter::All, |acc, p| acc.and(Filter::Predicate(p)))
    }
}

impl From<Predicate> for Filter {
    fn from(p: Predicate) -> Self {
        Filter::Predicate(p)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "TRUE"),
            Filter::Predicate(p) => write!(f, "{}", p),
            Filter::And(children) | Filter::Or(children) => {
                let joiner = if matches!(self, Filter::And(_)) { " AND " } else { " OR " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    match child {
                        Filter::And(_) | Filter::Or(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// The opposite direction
    pub fn reverse(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Applies a paging direction on top of this (natural) direction.
    ///
    /// Paging `Asc` keeps the natural order, paging `Desc` reverses it.
    pub fn then(&self, paging: SortDirection) -> Self {
        match paging {
            SortDirection::Asc => *self,
            SortDirection::Desc => self.reverse(),
        }
    }

    /// Orients an ascending comparison result.
    pub fn orient(&self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// Column to order by
    pub column: Column,
    /// Direction
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn new(column: Column, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_str().to_uppercase())
    }
}
