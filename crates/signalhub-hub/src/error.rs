//! Error types for the hub layer.
//!
//! Almost nothing in the hub fails loudly: malformed frames, rejected
//! tokens, and broken sockets are all logged and absorbed. What remains
//! are wiring mistakes made while assembling the server.

/// Errors that can occur while wiring up a hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A hub was already published to this
    /// [`HubAvailability`](crate::HubAvailability). At most one hub
    /// instance exists per availability handle.
    #[error("a hub has already been published")]
    AlreadyAvailable,
}
