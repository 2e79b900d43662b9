//! Store-backed guarded subscriptions.

use crate::guard::{self, SubscriptionHandle};
use crate::identity::IdentityCell;
use crate::registry::SubscriptionRegistry;
use std::sync::Arc;
use trackcar_store::{DocumentStore, ListenTarget, QuerySnapshot, StoreError};
use trackcar_types::Principal;

/// Opens guarded listeners on the document store and tracks them in the
/// session's registry.
#[derive(Clone)]
pub struct LiveQueries {
    store: Arc<dyn DocumentStore>,
    identity: IdentityCell,
    registry: SubscriptionRegistry,
}

impl LiveQueries {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: IdentityCell,
        registry: SubscriptionRegistry,
    ) -> Self {
        Self {
            store,
            identity,
            registry,
        }
    }

    /// Watches the target built by `target` for the signed-in principal.
    ///
    /// When nobody is signed in, `callback` gets `absent` once and nothing
    /// is registered.
    pub fn watch<T, Q, M, C>(
        &self,
        label: &'static str,
        absent: T,
        target: Q,
        map: M,
        callback: C,
    ) -> SubscriptionHandle
    where
        T: Clone + Send + Sync + 'static,
        Q: FnOnce(&Principal) -> ListenTarget,
        M: Fn(QuerySnapshot) -> T + Send + Sync + 'static,
        C: Fn(T) + Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        let identity = self.identity.clone();
        let handle = guard::open(&self.identity, label, absent, map, callback, move |sink| {
            // Signed out between the guard's check and here.
            let principal = identity
                .current()
                .ok_or_else(|| StoreError::PermissionDenied("not signed in".into()))?;
            store.listen(target(&principal), sink)
        });
        self.registry.track(&handle);
        handle
    }
}
