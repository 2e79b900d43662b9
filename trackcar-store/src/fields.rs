//! Write builder for document bodies.
//!
//! A [`Fields`] value is a list of per-key operations applied in one atomic
//! step to a single document. Later operations on the same key replace
//! earlier ones.

use crate::error::{StoreError, StoreResult};
use crate::value::{Timestamp, Value, ValueMap};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Resolved to the store's clock when the write is applied.
    ServerTimestamp,
    /// Adds to the stored number; a missing or non-numeric field counts as 0.
    Increment(i64),
    Delete,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
    ops: Vec<(String, FieldOp)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every non-null top-level field of `value` serialized to JSON.
    pub fn from_serialize<T: Serialize>(value: &T) -> StoreResult<Self> {
        match Value::from(serde_json::to_value(value)?) {
            Value::Map(map) => Ok(map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .fold(Self::new(), |fields, (k, v)| fields.set(k, v))),
            other => Err(StoreError::InvalidArgument(format!(
                "document body must be an object, got {other:?}"
            ))),
        }
    }

    fn push(mut self, key: impl Into<String>, op: FieldOp) -> Self {
        let key = key.into();
        self.ops.retain(|(k, _)| *k != key);
        self.ops.push((key, op));
        self
    }

    pub fn set(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, FieldOp::Set(value.into()))
    }

    /// Sets the key only when `value` is present; `None` leaves it unwritten.
    pub fn set_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn server_timestamp(self, key: impl Into<String>) -> Self {
        self.push(key, FieldOp::ServerTimestamp)
    }

    pub fn increment(self, key: impl Into<String>, by: i64) -> Self {
        self.push(key, FieldOp::Increment(by))
    }

    pub fn delete(self, key: impl Into<String>) -> Self {
        self.push(key, FieldOp::Delete)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ops.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldOp)> {
        self.ops.iter().map(|(k, op)| (k.as_str(), op))
    }

    /// Applies every operation to `target`, resolving server timestamps to
    /// `now`.
    pub fn apply(&self, target: &mut ValueMap, now: Timestamp) {
        for (key, op) in &self.ops {
            match op {
                FieldOp::Set(value) => {
                    target.insert(key.clone(), value.clone());
                }
                FieldOp::ServerTimestamp => {
                    target.insert(key.clone(), Value::Timestamp(now));
                }
                FieldOp::Increment(by) => {
                    let next = match target.get(key) {
                        Some(Value::Integer(i)) => Value::Integer(i.saturating_add(*by)),
                        Some(Value::Double(d)) => Value::Double(d + *by as f64),
                        _ => Value::Integer(*by),
                    };
                    target.insert(key.clone(), next);
                }
                FieldOp::Delete => {
                    target.remove(key);
                }
            }
        }
    }
}
