//! Error types for the protocol layer.
//!
//! Each crate in Signalhub defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning frames into values (or
//! back), not in networking or authentication.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into a text frame).
    ///
    /// Common causes: maps with non-string keys, or a `Serialize`
    /// impl that reports its own error.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning a text frame into a Rust value).
    ///
    /// For control messages this only happens when the frame is not
    /// JSON at all; a JSON document without an `auth` field still
    /// parses.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
