//! Document store contract for TrackCar.
//!
//! Persistence, query and real-time fan-out are owned by a managed backend.
//! This crate pins down the slice of that backend the service layer relies
//! on:
//!
//! - point lookup, add with generated id, replace, merge-update
//! - equality-filtered queries with one order field and a limit
//! - live listeners on a query or a single document
//! - per-document atomic increments and server timestamps
//!
//! No cross-document transactions are offered. [`MemoryStore`] implements
//! the whole contract in-process.

mod document;
mod error;
mod fields;
mod listen;
mod memory;
mod query;
mod value;

pub use document::{Document, QuerySnapshot};
pub use error::{StoreError, StoreResult};
pub use fields::{FieldOp, Fields};
pub use listen::{ListenTarget, ListenerRegistration, SnapshotSink};
pub use memory::MemoryStore;
pub use query::{Direction, Query};
pub use value::{ReadFields, Timestamp, Value, ValueMap};

use async_trait::async_trait;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Creates a document with a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    /// Creates or replaces the whole document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Merges into an existing document; `NotFound` if it does not exist.
    /// All operations in `fields` apply atomically.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    async fn query(&self, query: &Query) -> StoreResult<QuerySnapshot>;

    /// Registers a live listener. The sink gets the current result set, then
    /// a new one whenever it changes, until detached or sent an error.
    /// An error is always the last thing a listener receives.
    fn listen(&self, target: ListenTarget, sink: SnapshotSink)
    -> StoreResult<ListenerRegistration>;
}
