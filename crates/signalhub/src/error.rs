//! Unified error type for the Signalhub server.

use signalhub_hub::HubError;
use signalhub_protocol::ProtocolError;
use signalhub_session::SessionError;
use signalhub_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `signalhub` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum SignalhubError {
    /// A transport-level error (bind, accept, send).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (token rejected or expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A hub wiring error (hub published twice).
    #[error(transparent)]
    Hub(#[from] HubError),

    /// A configuration error (missing key).
    #[error(transparent)]
    Config(#[from] ConfigError),
}
