//! Wire protocol for Signalhub.
//!
//! This crate defines the "language" devices and the hub speak:
//!
//! - **Types** ([`ControlMessage`], [`AuthResponse`], [`AccountId`]) —
//!   the authentication handshake and the identity it yields.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how values become
//!   text frames and back.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding
//!   or decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (ControlMessage) → Session (AccountId)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{AccountId, AuthResponse, ControlMessage};
