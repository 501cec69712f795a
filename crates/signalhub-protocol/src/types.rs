//! Core protocol types for Signalhub's wire format.
//!
//! The wire protocol is deliberately tiny. Clients only ever send one
//! kind of frame:
//!
//! ```json
//! { "auth": "<opaque token>" }
//! ```
//!
//! and the server answers with:
//!
//! ```json
//! { "authorized": true }
//! ```
//!
//! Everything else the server sends is an opaque broadcast payload whose
//! schema belongs to the layer above the hub.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies the account (sign-in) a device authenticated as.
///
/// The value is whatever the authenticator derived from the token, for
/// instance a provider's stable user id. It's a newtype so it can't be
/// mixed up with the token it came from.
///
/// `Borrow<str>` lets maps keyed by `AccountId` be queried with a plain
/// `&str`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wraps an account identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identifier, which never counts as a
    /// successful verification.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwraps the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Control messages
// ---------------------------------------------------------------------------

/// Client → Server: the authentication envelope.
///
/// Any JSON document parses as a `ControlMessage`; the interesting part
/// is whether it carries a usable token. The `auth` field's text follows
/// JSON scalar semantics: strings are taken as-is, numbers, booleans and
/// `null` by their JSON spelling, and objects and arrays as empty. An
/// explicit `"auth": null` is therefore the token `"null"`, which gets
/// verified (and normally rejected) like any other.
/// Documents that aren't objects have no `auth` field at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlMessage {
    auth: Option<String>,
}

impl ControlMessage {
    /// Builds a control message carrying the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            auth: Some(token.into()),
        }
    }

    /// Extracts the control fields from an already parsed document.
    pub fn from_value(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        let auth = value.get("auth").map(|field| match field {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Array(_) | Value::Object(_) => String::new(),
        });
        Self { auth }
    }

    /// Returns the token if the message carries a non-empty one.
    pub fn token(&self) -> Option<&str> {
        self.auth.as_deref().filter(|t| !t.is_empty())
    }
}

impl<'de> Deserialize<'de> for ControlMessage {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl Serialize for ControlMessage {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map =
            serializer.serialize_map(Some(usize::from(self.auth.is_some())))?;
        if let Some(auth) = &self.auth {
            map.serialize_entry("auth", auth)?;
        }
        map.end()
    }
}

/// Server → Client: the authentication acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Whether the session is (still) authenticated.
    pub authorized: bool,
}

impl AuthResponse {
    /// `{"authorized":true}`
    pub const GRANTED: Self = Self { authorized: true };

    /// `{"authorized":false}`
    pub const DENIED: Self = Self { authorized: false };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ControlMessage {
        serde_json::from_str(text).expect("should parse")
    }

    #[test]
    fn test_control_message_string_token() {
        assert_eq!(parse(r#"{"auth":"tokA"}"#).token(), Some("tokA"));
    }

    #[test]
    fn test_control_message_missing_auth_has_no_token() {
        assert_eq!(parse(r#"{"hello":"world"}"#).token(), None);
    }

    #[test]
    fn test_control_message_empty_auth_has_no_token() {
        assert_eq!(parse(r#"{"auth":""}"#).token(), None);
    }

    #[test]
    fn test_control_message_scalar_auth_uses_json_text() {
        assert_eq!(parse(r#"{"auth":42}"#).token(), Some("42"));
        assert_eq!(parse(r#"{"auth":true}"#).token(), Some("true"));
    }

    #[test]
    fn test_control_message_null_auth_is_literal_null_token() {
        assert_eq!(parse(r#"{"auth":null}"#).token(), Some("null"));
    }

    #[test]
    fn test_control_message_structured_auth_is_empty() {
        assert_eq!(parse(r#"{"auth":{"t":1}}"#).token(), None);
        assert_eq!(parse(r#"{"auth":["t"]}"#).token(), None);
    }

    #[test]
    fn test_control_message_non_object_document_has_no_token() {
        assert_eq!(parse(r#"["auth"]"#).token(), None);
        assert_eq!(parse(r#""auth""#).token(), None);
    }

    #[test]
    fn test_control_message_rejects_invalid_json() {
        let result: Result<ControlMessage, _> = serde_json::from_str("auth=tok");
        assert!(result.is_err());
    }

    #[test]
    fn test_control_message_serializes_as_auth_object() {
        let text = serde_json::to_string(&ControlMessage::with_token("t"))
            .expect("should serialize");
        assert_eq!(text, r#"{"auth":"t"}"#);
    }

    #[test]
    fn test_auth_response_wire_format() {
        assert_eq!(
            serde_json::to_string(&AuthResponse::GRANTED).unwrap(),
            r#"{"authorized":true}"#
        );
        assert_eq!(
            serde_json::to_string(&AuthResponse::DENIED).unwrap(),
            r#"{"authorized":false}"#
        );
    }

    #[test]
    fn test_account_id_is_transparent_and_borrowable() {
        use std::collections::HashMap;

        let id = AccountId::new("userX");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""userX""#);
        assert_eq!(id.to_string(), "userX");

        let mut map = HashMap::new();
        map.insert(id, 1);
        assert_eq!(map.get("userX"), Some(&1));
    }
}
