//! The process-wide "who am I" cell.
//!
//! Single writer (the session), many readers. Live subscriptions read it
//! on every delivery instead of capturing the principal once.

use crate::error::{ServiceError, ServiceResult};
use std::sync::Arc;
use tokio::sync::watch;
use trackcar_types::Principal;

#[derive(Clone, Debug)]
pub struct IdentityCell {
    tx: Arc<watch::Sender<Option<Principal>>>,
}

impl Default for IdentityCell {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Principal> {
        self.tx.borrow().clone()
    }

    pub fn is_present(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// The current principal, or `Unauthenticated`.
    pub fn require(&self) -> ServiceResult<Principal> {
        self.current().ok_or(ServiceError::Unauthenticated)
    }

    pub fn set(&self, principal: Option<Principal>) {
        self.tx.send_replace(principal);
    }

    /// Change stream; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.tx.subscribe()
    }
}
