//! The hub: per-device authentication and per-account fan-out.
//!
//! Connection tasks feed three kinds of events into the hub:
//!
//! - [`handle_connect`](Hub::handle_connect) — a transport opened.
//! - [`handle_message`](Hub::handle_message) — a text frame arrived.
//! - [`handle_close`](Hub::handle_close) — the transport closed.
//!
//! Each call runs to completion on the caller's thread. The hub
//! consults the [`Authenticator`], updates the [`ConnectionRegistry`],
//! acknowledges the device, and fires lifecycle events, in that order.
//! Other subsystems call [`broadcast`](Hub::broadcast) to notify every
//! device of an account.
//!
//! # Authentication rules
//!
//! | Frame                          | Unauthenticated               | Authenticated                              |
//! |--------------------------------|-------------------------------|--------------------------------------------|
//! | not JSON                       | logged, dropped               | logged, dropped                            |
//! | no `auth` / empty `auth`       | `{"authorized":false}`        | `{"authorized":false}`, stays signed in    |
//! | token verifies                 | registered, `true`, Connected | nothing sent                               |
//! | token fails                    | `{"authorized":false}`        | unregistered, `false`, Disconnected        |
//!
//! Token expiry is only noticed when the device next sends a token;
//! there is no background sweep.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use signalhub_protocol::{
    AccountId, AuthResponse, Codec, ControlMessage, JsonCodec,
};
use signalhub_session::{
    AuthState, Authenticator, ConnectionRegistry, SessionError,
};
use signalhub_transport::{ConnectionId, Session};

use crate::{Dispatcher, LifecycleEvent, LifecycleListeners, SubscriptionId};

/// Real-time signaling hub for one server.
///
/// Build it once and share it by `Arc` with the connection handler and
/// every subsystem that broadcasts. All state lives behind interior
/// locks; every method takes `&self`.
pub struct Hub<S: Session, A: Authenticator, C: Codec = JsonCodec> {
    /// Session ↔ account bookkeeping. One lock guards both maps.
    registry: Mutex<ConnectionRegistry<S>>,
    authenticator: A,
    dispatcher: Dispatcher<C>,
    listeners: LifecycleListeners<S>,
}

impl<S: Session, A: Authenticator> Hub<S, A, JsonCodec> {
    /// Creates a hub speaking JSON.
    pub fn new(authenticator: A) -> Self {
        Self::with_codec(authenticator, JsonCodec)
    }
}

impl<S, A, C> Hub<S, A, C>
where
    S: Session,
    A: Authenticator,
    C: Codec,
{
    /// Creates a hub using a custom codec.
    pub fn with_codec(authenticator: A, codec: C) -> Self {
        Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            authenticator,
            dispatcher: Dispatcher::new(codec),
            listeners: LifecycleListeners::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Transport events
    // ---------------------------------------------------------------------

    /// A transport connection opened. Nothing is registered until the
    /// device authenticates.
    pub fn handle_connect(&self, session: &Arc<S>) {
        tracing::debug!(id = %session.id(), "device connected, awaiting auth");
    }

    /// Handles one inbound text frame and returns the session's state
    /// afterwards.
    pub fn handle_message(&self, session: &Arc<S>, text: &str) -> AuthState {
        let id = session.id();

        if !session.is_open() {
            tracing::debug!(%id, "ignoring frame from closed session");
            return AuthState::Closed;
        }

        let control: ControlMessage = match self.dispatcher.codec().decode(text)
        {
            Ok(control) => control,
            Err(e) => {
                tracing::warn!(%id, error = %e, "unable to parse message as JSON");
                return self.state_of(id);
            }
        };

        let Some(token) = control.token() else {
            // Answered the same way whether or not the device is signed
            // in; an authenticated device stays authenticated.
            self.acknowledge(session, AuthResponse::DENIED);
            return self.state_of(id);
        };

        let current = self.registry().account_for(id).cloned();
        match current {
            None => self.admit(session, token),
            Some(account_id) => self.reverify(session, token, account_id),
        }
    }

    /// The transport closed. Unregisters the session if it was signed in.
    ///
    /// Always returns [`AuthState::Closed`]; calling it twice for the
    /// same session is harmless.
    pub fn handle_close(
        &self,
        session: &Arc<S>,
        code: u16,
        reason: &str,
    ) -> AuthState {
        let id = session.id();

        let (removed, remaining, total) = {
            let mut registry = self.registry();
            let removed = registry.remove_session(id);
            let remaining = removed
                .as_ref()
                .map_or(0, |account_id| registry.device_count_for(account_id.as_str()));
            (removed, remaining, registry.device_count())
        };

        match removed {
            Some(account_id) => {
                tracing::info!(
                    %id,
                    %account_id,
                    code,
                    reason,
                    remaining,
                    devices = total,
                    "device disconnected"
                );
                self.listeners.notify(&LifecycleEvent::Disconnected {
                    session: Arc::clone(session),
                    account_id,
                });
            }
            None => {
                tracing::info!(
                    %id,
                    code,
                    reason,
                    devices = total,
                    "unauthenticated connection closed"
                );
            }
        }

        AuthState::Closed
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    /// Sends a payload to one session. Returns `true` if it was handed
    /// to the transport; failures are logged.
    pub fn send<T: Serialize + ?Sized>(&self, session: &S, payload: &T) -> bool {
        self.dispatcher.send(session, payload)
    }

    /// Sends a payload to every open device of an account.
    ///
    /// Returns how many devices the frame was handed to. Unknown
    /// accounts, encoding failures, and per-device write failures all
    /// yield fewer deliveries, never an error.
    pub fn broadcast<T: Serialize + ?Sized>(
        &self,
        account_id: &str,
        payload: &T,
    ) -> usize {
        // Snapshot under the lock, write after releasing it.
        let sessions = self.registry().sessions_for(account_id);
        if sessions.is_empty() {
            tracing::debug!(account_id, "no devices to broadcast to");
            return 0;
        }

        let delivered = self.dispatcher.broadcast(&sessions, payload);
        tracing::debug!(
            account_id,
            delivered,
            recipients = sessions.len(),
            "broadcast complete"
        );
        delivered
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Returns every account with a registry entry, including accounts
    /// whose devices have all disconnected.
    pub fn connected_account_ids(&self) -> HashSet<AccountId> {
        self.registry().connected_account_ids()
    }

    /// Returns the total number of authenticated devices.
    pub fn device_count(&self) -> usize {
        self.registry().device_count()
    }

    /// Returns the number of authenticated devices for one account.
    pub fn device_count_for(&self, account_id: &str) -> usize {
        self.registry().device_count_for(account_id)
    }

    /// Returns the account a session is signed in as.
    pub fn account_for(&self, id: ConnectionId) -> Option<AccountId> {
        self.registry().account_for(id).cloned()
    }

    /// Returns the authentication state of a live session.
    ///
    /// The hub doesn't track closed sessions, so this is either
    /// `Authenticated` or `Unauthenticated`.
    pub fn state_of(&self, id: ConnectionId) -> AuthState {
        match self.account_for(id) {
            Some(account_id) => AuthState::Authenticated(account_id),
            None => AuthState::Unauthenticated,
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle subscriptions
    // ---------------------------------------------------------------------

    /// Subscribes to connect/disconnect events. See [`LifecycleListeners`].
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&LifecycleEvent<S>) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Removes a lifecycle subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// First token from an unauthenticated session.
    fn admit(&self, session: &Arc<S>, token: &str) -> AuthState {
        let id = session.id();

        let Some(account_id) = self.verify(id, token) else {
            self.acknowledge(session, AuthResponse::DENIED);
            return AuthState::Unauthenticated;
        };

        let devices = {
            let mut registry = self.registry();
            registry.add_session(Arc::clone(session), account_id.clone());
            registry.device_count()
        };

        self.acknowledge(session, AuthResponse::GRANTED);
        tracing::info!(%id, %account_id, devices, "device authenticated");

        self.listeners.notify(&LifecycleEvent::Connected {
            session: Arc::clone(session),
            account_id: account_id.clone(),
        });
        AuthState::Authenticated(account_id)
    }

    /// Later token from an authenticated session: check it hasn't expired.
    fn reverify(
        &self,
        session: &Arc<S>,
        token: &str,
        account_id: AccountId,
    ) -> AuthState {
        let id = session.id();

        if let Some(verified) = self.verify(id, token) {
            if verified != account_id {
                tracing::debug!(
                    %id,
                    %account_id,
                    %verified,
                    "token now verifies as a different account; keeping registration"
                );
            }
            return AuthState::Authenticated(account_id);
        }

        let removed = self.registry().remove_session(id);
        self.acknowledge(session, AuthResponse::DENIED);

        if let Some(account_id) = removed {
            tracing::info!(%id, %account_id, "authentication expired, device signed out");
            self.listeners.notify(&LifecycleEvent::Disconnected {
                session: Arc::clone(session),
                account_id,
            });
        }
        AuthState::Unauthenticated
    }

    fn verify(&self, id: ConnectionId, token: &str) -> Option<AccountId> {
        match self.authenticator.verify(token) {
            Ok(account_id) if !account_id.is_empty() => Some(account_id),
            Ok(_) => {
                tracing::warn!(%id, error = %SessionError::EmptyAccount, "token rejected");
                None
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "token rejected");
                None
            }
        }
    }

    fn acknowledge(&self, session: &S, response: AuthResponse) {
        self.dispatcher.send(session, &response);
    }

    fn registry(&self) -> MutexGuard<'_, ConnectionRegistry<S>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =========================================================================
// Tests
// =========================================================================
