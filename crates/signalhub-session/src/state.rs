//! The per-session authentication state.

use signalhub_protocol::AccountId;

/// Where a device connection stands with the hub.
///
/// ```text
///                 verify ok
///   Unauthenticated ───────→ Authenticated(account)
///         ↑    │                    │
///         │    │   re-verify fails  │
///         │    └──────←─────────────┘
///         │                         │
///         └──(transport close)──→ Closed ←──(transport close)
/// ```
///
/// - **Unauthenticated**: the initial state. The session is connected
///   but absent from the registry, so it receives no broadcasts.
/// - **Authenticated**: the session is registered under an account.
/// - **Closed**: terminal. The session has been forgotten and no
///   further events for it are processed.
///
/// The registry is the source of truth: a session is `Authenticated`
/// exactly when the registry indexes it. This enum is what the hub
/// reports back after handling each event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Connected but not (or no longer) signed in.
    Unauthenticated,

    /// Signed in as the given account.
    Authenticated(AccountId),

    /// The transport has closed.
    Closed,
}

impl AuthState {
    /// Returns the account for an authenticated session.
    pub fn account_id(&self) -> Option<&AccountId> {
        match self {
            Self::Authenticated(account_id) => Some(account_id),
            Self::Unauthenticated | Self::Closed => None,
        }
    }

    /// Returns `true` for [`AuthState::Authenticated`].
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}
