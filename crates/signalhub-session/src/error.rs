//! Error types for the session layer.

/// Errors an [`Authenticator`](crate::Authenticator) reports when a token
/// can't be turned into an account.
///
/// The hub never forwards these to clients. Whatever the variant, the
/// device only ever sees `{"authorized":false}`; the detail goes to the
/// logs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The token was malformed, forged, or rejected by the identity
    /// provider.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The token was valid once but has since expired.
    #[error("token expired")]
    TokenExpired,

    /// Verification succeeded but yielded an empty account identifier.
    #[error("token did not identify an account")]
    EmptyAccount,
}
