//! Keyword-style filters: column conditions plus optional paging.

use crate::value::{Record, Value};
use std::fmt;

/// A condition on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Inclusive on both ends.
    Between(Value, Value),
}

impl Condition {
    /// SQL comparison operator for the single-operand conditions.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "=",
            Condition::Ne(_) => "<>",
            Condition::Gt(_) => ">",
            Condition::Gte(_) => ">=",
            Condition::Lt(_) => "<",
            Condition::Lte(_) => "<=",
            Condition::Between(..) => "BETWEEN",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Between(lo, hi) => write!(f, "BETWEEN {} AND {}", lo, hi),
            Condition::Eq(v)
            | Condition::Ne(v)
            | Condition::Gt(v)
            | Condition::Gte(v)
            | Condition::Lt(v)
            | Condition::Lte(v) => write!(f, "{} {}", self.operator(), v),
        }
    }
}

/// Ordered column → condition mapping used to build WHERE clauses.
///
/// Conditions are conjoined with AND in insertion order. `limit`/`offset`
/// only apply to reads.
///
/// ```
/// use litemodel::filter::Filter;
///
/// let filter = Filter::new().eq("rating", 5).between("rid", 1, 10).limit(2);
/// assert_eq!(filter.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty filter; matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Set the condition on `column`, replacing any earlier one.
    pub fn with(mut self, column: impl Into<String>, condition: Condition) -> Self {
        let column = column.into();
        match self.conditions.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = condition,
            None => self.conditions.push((column, condition)),
        }
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Ne(value.into()))
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gt(value.into()))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gte(value.into()))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lt(value.into()))
    }

    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lte(value.into()))
    }

    pub fn between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.with(column, Condition::Between(low.into(), high.into()))
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(c, cond)| (c.as_str(), cond))
    }

    pub fn limit_offset(&self) -> (Option<u64>, Option<u64>) {
        (self.limit, self.offset)
    }

    pub fn has_paging(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// True when there are no column conditions (paging is not counted).
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

/// Every field of the record becomes an exact match.
impl From<Record> for Filter {
    fn from(record: Record) -> Self {
        record
            .iter()
            .fold(Filter::new(), |filter, (column, value)| {
                filter.eq(column, value.clone())
            })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (column, value)| filter.eq(column, value))
    }
}
