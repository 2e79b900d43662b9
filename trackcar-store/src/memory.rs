//! In-process document store with live-query fan-out.
//!
//! Every write bumps a store-wide revision. Listeners whose collection was
//! touched are re-evaluated under the lock, then notified after it is
//! released. Each listener remembers the last revision it saw, so a
//! snapshot that loses a race with a newer one is dropped instead of
//! delivered out of order. Unchanged result sets are not re-delivered.

use crate::document::{Document, QuerySnapshot};
use crate::error::{StoreError, StoreResult};
use crate::fields::Fields;
use crate::listen::{ListenTarget, ListenerRegistration, SnapshotSink};
use crate::query::Query;
use crate::value::{Timestamp, ValueMap};
use crate::DocumentStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, ValueMap>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener_id: u64,
    revision: u64,
    offline: bool,
}

struct Listener {
    target: ListenTarget,
    slot: Arc<ListenerSlot>,
}

struct ListenerSlot {
    sink: SnapshotSink,
    attached: AtomicBool,
    delivered: Mutex<Delivered>,
}

#[derive(Default)]
struct Delivered {
    revision: Option<u64>,
    last: Option<Vec<Document>>,
}

struct Pending {
    slot: Arc<ListenerSlot>,
    revision: u64,
    documents: Vec<Document>,
}

impl ListenerSlot {
    fn new(sink: SnapshotSink) -> Self {
        Self {
            sink,
            attached: AtomicBool::new(true),
            delivered: Mutex::new(Delivered::default()),
        }
    }

    fn deliver(&self, revision: u64, documents: Vec<Document>) {
        let mut state = lock(&self.delivered);
        if !self.attached.load(Ordering::Acquire) {
            return;
        }
        if state.revision.is_some_and(|seen| revision <= seen) {
            return;
        }
        state.revision = Some(revision);
        if state.last.as_ref() == Some(&documents) {
            return;
        }
        state.last = Some(documents.clone());
        (self.sink)(Ok(QuerySnapshot::new(documents)));
    }

    /// Pushes a terminal error. The listener is detached first.
    fn fail(&self, err: StoreError) {
        let _state = lock(&self.delivered);
        if self.attached.swap(false, Ordering::AcqRel) {
            (self.sink)(Err(err));
        }
    }
}

impl Inner {
    fn check_online(&self) -> StoreResult<()> {
        if self.offline {
            Err(StoreError::Unavailable("store is offline".into()))
        } else {
            Ok(())
        }
    }

    fn documents_in(&self, collection: &str) -> impl Iterator<Item = Document> {
        self.collections
            .get(collection)
            .into_iter()
            .flatten()
            .map(move |(id, data)| Document::new(collection, id.as_str(), data.clone()))
    }

    fn evaluate(&self, target: &ListenTarget) -> Vec<Document> {
        match target {
            ListenTarget::Query(q) => q.run(self.documents_in(&q.collection)),
            ListenTarget::Document { collection, id } => self
                .collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .map(|data| Document::new(collection.as_str(), id.as_str(), data.clone()))
                .into_iter()
                .collect(),
        }
    }

    fn pending_for(&self, collection: &str) -> Vec<Pending> {
        self.listeners
            .values()
            .filter(|l| l.target.collection() == collection)
            .map(|l| Pending {
                slot: Arc::clone(&l.slot),
                revision: self.revision,
                documents: self.evaluate(&l.target),
            })
            .collect()
    }
}

fn check_path(collection: &str, id: &str) -> StoreResult<()> {
    let bad = |s: &str| s.is_empty() || s.contains('/');
    if bad(collection) || bad(id) {
        return Err(StoreError::InvalidArgument(format!(
            "invalid document path {collection:?}/{id:?}"
        )));
    }
    Ok(())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `mutate` to one document under the lock, then fans out.
    fn commit<F>(&self, collection: &str, id: &str, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(Option<&ValueMap>) -> StoreResult<ValueMap>,
    {
        check_path(collection, id)?;
        let pending = {
            let mut inner = lock(&self.inner);
            inner.check_online()?;
            let docs = inner.collections.entry(collection.to_string()).or_default();
            let body = mutate(docs.get(id))?;
            docs.insert(id.to_string(), body);
            inner.revision += 1;
            inner.pending_for(collection)
        };
        for p in pending {
            p.slot.deliver(p.revision, p.documents);
        }
        Ok(())
    }

    /// While offline every request and new listener fails with
    /// `Unavailable`. Existing listeners stay attached.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.inner).offline = offline;
    }

    /// Pushes `err` to every listener and detaches them all.
    pub fn fail_listeners(&self, err: StoreError) {
        let slots: Vec<_> = {
            let mut inner = lock(&self.inner);
            std::mem::take(&mut inner.listeners)
                .into_values()
                .map(|l| l.slot)
                .collect()
        };
        debug!(count = slots.len(), error = %err, "failing live listeners");
        for slot in slots {
            slot.fail(err.clone());
        }
    }

    /// What the backend does to in-flight listeners once their credentials
    /// are gone.
    pub fn revoke_listeners(&self) {
        self.fail_listeners(StoreError::PermissionDenied(
            "missing or insufficient permissions".into(),
        ));
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn document_count(&self, collection: &str) -> usize {
        lock(&self.inner)
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        check_path(collection, id)?;
        let inner = lock(&self.inner);
        inner.check_online()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(collection, id, data.clone())))
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.commit(collection, &id, |_| {
            let mut body = ValueMap::new();
            fields.apply(&mut body, Timestamp::now());
            Ok(body)
        })?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.commit(collection, id, |_| {
            let mut body = ValueMap::new();
            fields.apply(&mut body, Timestamp::now());
            Ok(body)
        })
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.commit(collection, id, |existing| {
            let mut body = existing
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
            fields.apply(&mut body, Timestamp::now());
            Ok(body)
        })
    }

    async fn query(&self, query: &Query) -> StoreResult<QuerySnapshot> {
        let inner = lock(&self.inner);
        inner.check_online()?;
        Ok(QuerySnapshot::new(
            query.run(inner.documents_in(&query.collection)),
        ))
    }

    fn listen(&self, target: ListenTarget, sink: SnapshotSink) -> StoreResult<ListenerRegistration> {
        if let ListenTarget::Document { collection, id } = &target {
            check_path(collection, id)?;
        }
        let (id, slot, revision, initial) = {
            let mut inner = lock(&self.inner);
            inner.check_online()?;
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            let slot = Arc::new(ListenerSlot::new(sink));
            let initial = inner.evaluate(&target);
            inner.listeners.insert(
                id,
                Listener {
                    target,
                    slot: Arc::clone(&slot),
                },
            );
            (id, slot, inner.revision, initial)
        };
        debug!(listener = id, "listener attached");
        slot.deliver(revision, initial);

        let store = Arc::downgrade(&self.inner);
        Ok(ListenerRegistration::new(move || {
            slot.attached.store(false, Ordering::Release);
            if let Some(inner) = store.upgrade() {
                lock(&inner).listeners.remove(&id);
            }
            debug!(listener = id, "listener detached");
        }))
    }
}
