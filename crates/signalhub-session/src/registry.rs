//! The connection registry: which devices are signed into which account.
//!
//! This is the central data structure of the session layer. It keeps two
//! maps in lockstep:
//!
//! - **groups**: `AccountId → {ConnectionId → Arc<S>}` — every live,
//!   authenticated session of an account. Broadcasts iterate this.
//! - **index**: `ConnectionId → AccountId` — answers "is this session
//!   authenticated, and as whom?" in O(1).
//!
//! A session is in `index` if and only if it is in exactly one group.
//! Every mutation goes through [`add_session`](ConnectionRegistry::add_session)
//! or [`remove_session`](ConnectionRegistry::remove_session), which update
//! both maps together.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is NOT thread-safe by itself — it uses plain
//! `HashMap`s. The hub owns exactly one registry behind one mutex, so a
//! close on one connection task can never interleave with a broadcast
//! snapshot taken on another, and the two maps can never drift apart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use signalhub_protocol::AccountId;
use signalhub_transport::{ConnectionId, Session};

/// Every authenticated session of one account.
///
/// Groups are created on the account's first authentication and are kept
/// even after their last session leaves.
struct AccountGroup<S> {
    sessions: HashMap<ConnectionId, Arc<S>>,
}

impl<S> Default for AccountGroup<S> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

/// Bidirectional mapping between live sessions and accounts.
///
/// Lookups on unknown sessions or accounts never fail; they return
/// empty collections or zero.
pub struct ConnectionRegistry<S: Session> {
    /// Sessions per account.
    groups: HashMap<AccountId, AccountGroup<S>>,

    /// Reverse index, kept in sync with `groups`.
    index: HashMap<ConnectionId, AccountId>,
}

impl<S: Session> ConnectionRegistry<S> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// Registers `session` under `account_id`.
    ///
    /// Creates the account's group on first use. Adding the same session
    /// to the same account again is a no-op. If the session is currently
    /// registered under a *different* account it is moved, so it never
    /// belongs to two groups at once.
    ///
    /// Returns `true` if the registry changed.
    pub fn add_session(&mut self, session: Arc<S>, account_id: AccountId) -> bool {
        let id = session.id();

        match self.index.get(&id).cloned() {
            Some(current) if current == account_id => return false,
            Some(_) => {
                let previous = self.remove_session(id);
                tracing::debug!(
                    %id,
                    ?previous,
                    %account_id,
                    "moving session to a different account"
                );
            }
            None => {}
        }

        self.index.insert(id, account_id.clone());
        self.groups
            .entry(account_id)
            .or_default()
            .sessions
            .insert(id, session);
        true
    }

    /// Forgets a session.
    ///
    /// Returns the account it was registered under, or `None` (and does
    /// nothing) if the session wasn't registered. The account's group is
    /// kept even if this was its last session.
    pub fn remove_session(&mut self, id: ConnectionId) -> Option<AccountId> {
        let account_id = self.index.remove(&id)?;
        if let Some(group) = self.groups.get_mut(&account_id) {
            group.sessions.remove(&id);
        }
        Some(account_id)
    }

    /// Returns a snapshot of every session registered under `account_id`.
    ///
    /// The snapshot holds its own `Arc`s, so it stays valid after the
    /// caller releases whatever lock guards the registry.
    pub fn sessions_for(&self, account_id: &str) -> Vec<Arc<S>> {
        self.groups
            .get(account_id)
            .map(|group| group.sessions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns every account with a group, including groups that are
    /// currently empty.
    pub fn connected_account_ids(&self) -> HashSet<AccountId> {
        self.groups.keys().cloned().collect()
    }

    /// Returns the number of registered sessions across all accounts.
    ///
    /// Accounts may use several devices, so this can exceed the number
    /// of accounts.
    pub fn device_count(&self) -> usize {
        self.groups.values().map(|g| g.sessions.len()).sum()
    }

    /// Returns the number of sessions registered under one account.
    pub fn device_count_for(&self, account_id: &str) -> usize {
        self.groups
            .get(account_id)
            .map_or(0, |group| group.sessions.len())
    }

    /// Returns the account a session is registered under.
    pub fn account_for(&self, id: ConnectionId) -> Option<&AccountId> {
        self.index.get(&id)
    }

    /// Returns `true` if the session is registered under some account.
    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.index.contains_key(&id)
    }

    /// Returns the number of account groups (empty ones included).
    pub fn account_count(&self) -> usize {
        self.groups.len()
    }

    /// Checks that `index` and `groups` describe the same membership.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let grouped: usize = self.device_count();
        grouped == self.index.len()
            && self.index.iter().all(|(id, account_id)| {
                self.groups
                    .get(account_id)
                    .is_some_and(|g| g.sessions.contains_key(id))
            })
    }
}

impl<S: Session> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
