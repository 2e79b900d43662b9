//! Guarded live subscription.
//!
//! Wraps one store listener so that its callback only fires while the
//! handle is live and a principal is signed in:
//!
//! - no principal at open: one synchronous `absent` delivery, no listener
//!   is registered, and the handle is inert;
//! - principal gone at delivery: one final `absent`, then the listener is
//!   detached and the handle goes inactive for good;
//! - listener error: `absent` is delivered and the handle goes inactive.
//!   Permission denied with no principal is the expected sign-out race and
//!   is logged at debug; anything else is logged as an error. No retry.
//!
//! [`SubscriptionHandle::cancel`] is idempotent. Once it returns, the
//! callback will not be invoked again, even for a push already in flight on
//! another thread. Cancelling from inside the callback is allowed.

use crate::error::ListenFailure;
use crate::identity::IdentityCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, error};
use trackcar_store::{ListenerRegistration, QuerySnapshot, SnapshotSink, StoreResult};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Something the subscription registry can cancel.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
    fn is_active(&self) -> bool;
}

type Callback<T> = Box<dyn Fn(T) + Send + Sync>;
type Mapper<T> = Box<dyn Fn(QuerySnapshot) -> T + Send + Sync>;

struct Guard<T> {
    label: &'static str,
    identity: IdentityCell,
    absent: T,
    map: Mapper<T>,
    callback: Callback<T>,
    active: AtomicBool,
    registration: Mutex<Option<ListenerRegistration>>,
    /// Held for the whole of a delivery. Cancel waits on it.
    gate: Mutex<()>,
    delivering: Mutex<Option<ThreadId>>,
}

impl<T> Guard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn on_event(&self, event: StoreResult<QuerySnapshot>) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let _gate = lock(&self.gate);
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        *lock(&self.delivering) = Some(thread::current().id());

        let present = self.identity.is_present();
        match event {
            Ok(snapshot) if present => (self.callback)((self.map)(snapshot)),
            Ok(_) => {
                debug!(subscription = self.label, "principal gone, closing subscription");
                self.close_with_absent();
            }
            Err(err) => {
                match ListenFailure::classify(&err, present) {
                    ListenFailure::BenignRace => {
                        debug!(subscription = self.label, error = %err, "listener revoked after sign-out")
                    }
                    ListenFailure::Fault => {
                        error!(subscription = self.label, error = %err, "live listener failed")
                    }
                }
                self.close_with_absent();
            }
        }

        *lock(&self.delivering) = None;
    }

    fn close_with_absent(&self) {
        self.active.store(false, Ordering::Release);
        (self.callback)(self.absent.clone());
        self.detach();
    }

    fn detach(&self) {
        let registration = lock(&self.registration).take();
        if let Some(registration) = registration {
            registration.remove();
        }
    }

    fn is_delivering_here(&self) -> bool {
        *lock(&self.delivering) == Some(thread::current().id())
    }
}

impl<T> Cancellable for Guard<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn cancel(&self) {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        if !self.is_delivering_here() {
            // Wait out a delivery running on another thread.
            drop(lock(&self.gate));
        }
        self.detach();
        if was_active {
            debug!(subscription = self.label, "subscription cancelled");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Teardown handle for a guarded subscription. Cancels on drop.
pub struct SubscriptionHandle {
    guard: Option<Arc<dyn Cancellable>>,
}

impl SubscriptionHandle {
    /// A handle with nothing behind it.
    pub fn inert() -> Self {
        Self { guard: None }
    }

    pub fn cancel(&self) {
        if let Some(guard) = &self.guard {
            guard.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.guard.as_ref().is_some_and(|g| g.is_active())
    }

    pub(crate) fn downgrade(&self) -> Option<Weak<dyn Cancellable>> {
        self.guard.as_ref().map(Arc::downgrade)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Opens a guarded subscription.
///
/// `listen` registers the underlying store listener with the sink it is
/// given; it is not called when no principal is signed in. `map` turns a
/// snapshot into the delivered value, `absent` is delivered in its place
/// when there is nothing to show.
pub fn open<T, M, C, L>(
    identity: &IdentityCell,
    label: &'static str,
    absent: T,
    map: M,
    callback: C,
    listen: L,
) -> SubscriptionHandle
where
    T: Clone + Send + Sync + 'static,
    M: Fn(QuerySnapshot) -> T + Send + Sync + 'static,
    C: Fn(T) + Send + Sync + 'static,
    L: FnOnce(SnapshotSink) -> StoreResult<ListenerRegistration>,
{
    if !identity.is_present() {
        debug!(subscription = label, "not signed in, subscription not started");
        callback(absent);
        return SubscriptionHandle::inert();
    }

    let guard = Arc::new(Guard {
        label,
        identity: identity.clone(),
        absent,
        map: Box::new(map),
        callback: Box::new(callback),
        active: AtomicBool::new(true),
        registration: Mutex::new(None),
        gate: Mutex::new(()),
        delivering: Mutex::new(None),
    });

    let weak = Arc::downgrade(&guard);
    let sink: SnapshotSink = Arc::new(move |event| {
        if let Some(guard) = weak.upgrade() {
            guard.on_event(event);
        }
    });

    match listen(sink) {
        Ok(registration) => {
            *lock(&guard.registration) = Some(registration);
            // Closed during the initial delivery, or cancelled concurrently.
            if !guard.is_active() {
                guard.detach();
            }
        }
        Err(err) => guard.on_event(Err(err)),
    }

    debug!(subscription = label, active = guard.is_active(), "subscription opened");
    let guard: Arc<dyn Cancellable> = guard;
    SubscriptionHandle { guard: Some(guard) }
}
