//! Live-query plumbing shared by every store implementation.

use crate::document::QuerySnapshot;
use crate::error::StoreResult;
use crate::query::Query;
use std::fmt;
use std::sync::Arc;

/// What a live listener watches.
#[derive(Clone, Debug, PartialEq)]
pub enum ListenTarget {
    Query(Query),
    Document { collection: String, id: String },
}

impl ListenTarget {
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Query(q) => &q.collection,
            Self::Document { collection, .. } => collection,
        }
    }
}

impl From<Query> for ListenTarget {
    fn from(q: Query) -> Self {
        Self::Query(q)
    }
}

/// Callback receiving pushed snapshots or a terminal error.
pub type SnapshotSink = Arc<dyn Fn(StoreResult<QuerySnapshot>) + Send + Sync>;

/// Handle to a registered listener. Detaches on [`remove`](Self::remove)
/// or drop, whichever comes first.
pub struct ListenerRegistration {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A registration with nothing to detach.
    pub fn noop() -> Self {
        Self { detach: None }
    }

    pub fn remove(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}
