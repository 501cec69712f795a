//! Authentication hook for validating device identity.
//!
//! Signalhub doesn't verify tokens itself — that's the identity
//! provider's job (Google ID tokens, a custom JWT issuer, etc.).
//!
//! Instead, it defines the [`Authenticator`] trait: a single method that
//! takes a token string and returns an [`AccountId`] or an error. The hub
//! calls it when a device first presents a token and again on every
//! later token, to notice expiry.
//!
//! The call is synchronous. The hub runs it inline on the connection's
//! task so the device's frames are handled strictly in order;
//! implementations that need network access should keep a local cache
//! of verification keys rather than calling out per token.

use signalhub_protocol::AccountId;

use crate::SessionError;

/// Validates a device's auth token and returns the account it signs in as.
///
/// # Trait bounds
///
/// - `Send + Sync` → one authenticator is shared by every connection
///   task, and tasks may run on different threads.
/// - `'static` → it lives as long as the hub.
///
/// # Example
///
/// ```rust
/// use signalhub_protocol::AccountId;
/// use signalhub_session::{Authenticator, SessionError};
///
/// /// Accepts tokens of the form `user:<id>`.
/// /// Only for development — never use this in production!
/// struct PrefixAuthenticator;
///
/// impl Authenticator for PrefixAuthenticator {
///     fn verify(&self, token: &str) -> Result<AccountId, SessionError> {
///         token
///             .strip_prefix("user:")
///             .map(AccountId::from)
///             .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
///     }
/// }
///
/// let auth = PrefixAuthenticator;
/// assert_eq!(auth.verify("user:ada").unwrap().as_str(), "ada");
/// assert!(auth.verify("ada").is_err());
/// ```
///
/// Closures of type `Fn(&str) -> Option<AccountId>` implement the trait
/// too, which keeps tests short:
///
/// ```rust
/// use signalhub_protocol::AccountId;
/// use signalhub_session::Authenticator;
///
/// let auth = |token: &str| (token == "tokA").then(|| AccountId::from("userX"));
/// assert!(auth.verify("tokA").is_ok());
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the account's identity.
    ///
    /// # Returns
    /// - `Ok(AccountId)` — the token is valid for this account. An empty
    ///   identifier is treated by the hub as a failure.
    /// - `Err(SessionError)` — the token is invalid or expired.
    fn verify(&self, token: &str) -> Result<AccountId, SessionError>;
}

impl<F> Authenticator for F
where
    F: Fn(&str) -> Option<AccountId> + Send + Sync + 'static,
{
    fn verify(&self, token: &str) -> Result<AccountId, SessionError> {
        self(token).ok_or_else(|| {
            SessionError::AuthFailed("token not recognised".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_authenticator_maps_none_to_auth_failed() {
        let auth = |_: &str| -> Option<AccountId> { None };

        let result = auth.verify("anything");

        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
    }

    #[test]
    fn test_closure_authenticator_returns_account() {
        let auth = |token: &str| Some(AccountId::new(format!("acct-{token}")));

        let account = auth.verify("7").expect("should verify");

        assert_eq!(account.as_str(), "acct-7");
    }
}
