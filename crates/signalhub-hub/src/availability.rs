//! Hub availability: letting subsystems wait for the hub to exist.
//!
//! Subsystems are often wired up before the server has finished building
//! its hub (a sync service might want to broadcast "changed" notices,
//! but is constructed first). They register a one-shot callback on a
//! shared [`HubAvailability`]; the server publishes the hub into it once
//! built, which runs every buffered callback exactly once, in
//! registration order. Callbacks registered after that run immediately.
//!
//! While `publish` is still flushing, new registrations join the back of
//! the queue instead of running at once. A late subscriber on another
//! thread therefore never sees the hub before the callbacks buffered
//! ahead of it have run.
//!
//! ```text
//!   on_available(f1) ─┐
//!   on_available(f2) ─┼─ buffered
//!                     │
//!   publish(hub) ─────┴─→ f1(hub), f2(hub)
//!
//!   on_available(f3) ───→ f3(hub)   (immediately, on the caller's thread)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::HubError;

type Pending<H> = Box<dyn FnOnce(&Arc<H>) + Send>;

/// Identifies a buffered availability callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvailabilityToken(u64);

struct AvailabilityState<H> {
    instance: Option<Arc<H>>,
    pending: Vec<(AvailabilityToken, Pending<H>)>,
    /// Set while `publish` drains `pending`.
    flushing: bool,
}

/// A write-once slot for the hub plus a queue of callbacks waiting on it.
///
/// Share it by `Arc` between the server builder and every subsystem that
/// needs the hub.
pub struct HubAvailability<H> {
    next_token: AtomicU64,
    state: Mutex<AvailabilityState<H>>,
}

impl<H> HubAvailability<H> {
    /// Creates an empty slot with no waiting callbacks.
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            state: Mutex::new(AvailabilityState {
                instance: None,
                pending: Vec::new(),
                flushing: false,
            }),
        }
    }

    /// Runs `callback` with the hub once it exists.
    ///
    /// If the hub is already published and fully flushed, the callback
    /// runs right now, on this thread, before `on_available` returns.
    /// Otherwise it is buffered and [`publish`](Self::publish) runs it
    /// after everything registered before it.
    ///
    /// The returned token can [`cancel`](Self::cancel) a buffered
    /// callback; it is meaningless once the callback has run.
    pub fn on_available<F>(&self, callback: F) -> AvailabilityToken
    where
        F: FnOnce(&Arc<H>) + Send + 'static,
    {
        let token =
            AvailabilityToken(self.next_token.fetch_add(1, Ordering::Relaxed));

        let instance = {
            let mut state = self.lock();
            match state.instance.clone() {
                Some(hub) if !state.flushing => hub,
                _ => {
                    state.pending.push((token, Box::new(callback)));
                    return token;
                }
            }
        };

        // Run outside the lock; the callback may register more callbacks.
        callback(&instance);
        token
    }

    /// Drops a buffered callback. Returns `false` if it already ran or
    /// was never buffered.
    pub fn cancel(&self, token: AvailabilityToken) -> bool {
        let mut state = self.lock();
        let before = state.pending.len();
        state.pending.retain(|(t, _)| *t != token);
        state.pending.len() != before
    }

    /// Publishes the hub and flushes buffered callbacks in order.
    ///
    /// Callbacks registered during the flush, from a callback or from
    /// another thread, are queued behind the ones already waiting and
    /// run before this returns.
    ///
    /// # Errors
    /// Returns [`HubError::AlreadyAvailable`] if a hub was already
    /// published; the new one is dropped and no callbacks run.
    pub fn publish(&self, hub: Arc<H>) -> Result<(), HubError> {
        {
            let mut state = self.lock();
            if state.instance.is_some() {
                return Err(HubError::AlreadyAvailable);
            }
            state.instance = Some(Arc::clone(&hub));
            state.flushing = true;
            tracing::debug!(
                waiting = state.pending.len(),
                "hub available, flushing callbacks"
            );
        }

        let _guard = FlushGuard(self);
        loop {
            let batch = {
                let mut state = self.lock();
                if state.pending.is_empty() {
                    // Checked and cleared under one lock, so nothing
                    // registered in between is stranded.
                    state.flushing = false;
                    break;
                }
                std::mem::take(&mut state.pending)
            };
            for (_, callback) in batch {
                callback(&hub);
            }
        }
        Ok(())
    }

    /// Returns the published hub, if any.
    pub fn get(&self) -> Option<Arc<H>> {
        self.lock().instance.clone()
    }

    /// Returns `true` once a hub has been published.
    pub fn is_available(&self) -> bool {
        self.lock().instance.is_some()
    }

    /// Returns the number of callbacks still waiting.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, AvailabilityState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the flushing flag if a callback panics mid-flush.
struct FlushGuard<'a, H>(&'a HubAvailability<H>);

impl<H> Drop for FlushGuard<'_, H> {
    fn drop(&mut self) {
        self.0.lock().flushing = false;
    }
}

impl<H> Default for HubAvailability<H> {
    fn default() -> Self {
        Self::new()
    }
}
