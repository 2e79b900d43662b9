//! Filtered, ordered, limited collection queries.

use crate::document::Document;
use crate::value::{ReadFields, Value, ValueMap};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Documents without `field` drop out of the result.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// True when `data` satisfies every equality filter and carries the
    /// order field, if any.
    pub fn matches(&self, data: &ValueMap) -> bool {
        let filtered = self.filters.iter().all(|(field, expected)| {
            data.field(field)
                .is_some_and(|actual| actual.compare(expected) == Ordering::Equal)
        });
        let ordered = self
            .order
            .as_ref()
            .is_none_or(|(field, _)| data.contains_key(field));
        filtered && ordered
    }

    /// Filters, sorts and truncates `docs`. Without an explicit order,
    /// results are sorted by document id.
    pub fn run(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();

        match &self.order {
            Some((field, direction)) => out.sort_by(|a, b| {
                let ord = match (a.data.get(field), b.data.get(field)) {
                    (Some(x), Some(y)) => x.compare(y),
                    _ => Ordering::Equal,
                };
                let ord = match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                };
                ord.then_with(|| a.id.cmp(&b.id))
            }),
            None => out.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}
