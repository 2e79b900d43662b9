//! Process-wide registry of open subscriptions.
//!
//! Sign-out cancels everything registered here before the provider is told,
//! so no screen keeps listening past the end of a session. Entries are weak;
//! dropping a handle is enough to unregister it.

use crate::guard::{Cancellable, SubscriptionHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<Mutex<Vec<Weak<dyn Cancellable>>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Weak<dyn Cancellable>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn track(&self, handle: &SubscriptionHandle) {
        let Some(weak) = handle.downgrade() else {
            return;
        };
        let mut entries = self.entries();
        entries.retain(|e| e.upgrade().is_some_and(|g| g.is_active()));
        entries.push(weak);
    }

    /// Cancels every live subscription and returns how many were active.
    pub fn cancel_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.entries());
        let mut cancelled = 0;
        for guard in drained.iter().filter_map(Weak::upgrade) {
            if guard.is_active() {
                cancelled += 1;
            }
            guard.cancel();
        }
        debug!(cancelled, "cancelled all subscriptions");
        cancelled
    }

    pub fn active_count(&self) -> usize {
        self.entries()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|g| g.is_active())
            .count()
    }
}
