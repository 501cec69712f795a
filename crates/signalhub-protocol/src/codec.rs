//! Codec trait and the JSON implementation used on the wire.
//!
//! A "codec" (coder/decoder) converts between Rust values and text
//! frames. The hub never looks inside broadcast payloads; it only needs
//! something that implements [`Codec`] to turn them into a frame once
//! and reuse that frame for every recipient.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode values to text frames and decode them back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → shared by every connection task through the hub.
/// - `'static` → the codec owns everything it needs; it lives as long
///   as the hub.
///
/// `encode` accepts `?Sized` values so callers can pass `&str`-like or
/// trait-object payloads (e.g. `&serde_json::Value` or `&dyn ...`)
/// without boxing.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError>;

    /// Deserializes a text frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or
    /// doesn't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Output is compact (no whitespace), so `{"event":"changed"}` goes out
/// byte-for-byte as written.
///
/// ## Example
///
/// ```rust
/// use signalhub_protocol::{AuthResponse, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let text = codec.encode(&AuthResponse::GRANTED).unwrap();
/// assert_eq!(text, r#"{"authorized":true}"#);
///
/// let back: AuthResponse = codec.decode(&text).unwrap();
/// assert!(back.authorized);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
