//! Lifecycle events: telling other subsystems when devices come and go.
//!
//! Subsystems that care about who is online (for example, a document
//! lock service that releases a device's locks when it drops off)
//! subscribe a callback. The hub fires it synchronously, on the thread
//! that handled the triggering frame, in the order subscriptions were
//! made.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use signalhub_protocol::AccountId;
use signalhub_transport::Session;

/// Identifies a subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Something happened to an authenticated session.
#[derive(Debug)]
pub enum LifecycleEvent<S> {
    /// The session authenticated as `account_id`.
    Connected {
        session: Arc<S>,
        account_id: AccountId,
    },

    /// The session is no longer authenticated as `account_id`, either
    /// because its transport closed or because its token stopped
    /// verifying.
    Disconnected {
        session: Arc<S>,
        account_id: AccountId,
    },
}

// Manual impl: deriving would demand `S: Clone`, but only the `Arc` is
// cloned.
impl<S> Clone for LifecycleEvent<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Connected {
                session,
                account_id,
            } => Self::Connected {
                session: Arc::clone(session),
                account_id: account_id.clone(),
            },
            Self::Disconnected {
                session,
                account_id,
            } => Self::Disconnected {
                session: Arc::clone(session),
                account_id: account_id.clone(),
            },
        }
    }
}

impl<S> LifecycleEvent<S> {
    /// The session the event is about.
    pub fn session(&self) -> &Arc<S> {
        match self {
            Self::Connected { session, .. }
            | Self::Disconnected { session, .. } => session,
        }
    }

    /// The account the session was (or now is) registered under.
    pub fn account_id(&self) -> &AccountId {
        match self {
            Self::Connected { account_id, .. }
            | Self::Disconnected { account_id, .. } => account_id,
        }
    }

    /// Returns `true` for [`LifecycleEvent::Connected`].
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

type Listener<S> = Arc<dyn Fn(&LifecycleEvent<S>) + Send + Sync>;

/// An ordered list of lifecycle subscribers.
///
/// Delivery is synchronous and has no timeout. Subscribers run on a
/// connection task and must return quickly; anything slow belongs on a
/// task of its own.
pub struct LifecycleListeners<S> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener<S>)>>,
}

impl<S: Session> LifecycleListeners<S> {
    /// Creates an empty subscriber list.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber. It will be called after every subscriber
    /// registered before it.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent<S>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    /// Delivers `event` to every subscriber, in registration order.
    ///
    /// The list is snapshotted first and the lock released, so a
    /// subscriber may itself subscribe, unsubscribe, or call back into
    /// the hub.
    pub fn notify(&self, event: &LifecycleEvent<S>) {
        let snapshot: Vec<Listener<S>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }
    }

    /// Returns the number of subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Listener<S>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Session> Default for LifecycleListeners<S> {
    fn default() -> Self {
        Self::new()
    }
}
