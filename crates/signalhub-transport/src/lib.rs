//! Transport abstraction layer for Signalhub.
//!
//! Two halves of a live connection are modelled separately:
//!
//! - [`Connection`] — the *inbound* half. Owned by exactly one task,
//!   which pulls frames off it in the order the peer sent them.
//! - [`Session`] — the *outbound* half. A cheap, shareable handle
//!   (`Arc<S>`) that any thread can use to push a text frame to the
//!   peer without waiting. This is what the hub stores in its registry
//!   and what broadcasts iterate over.
//!
//! Splitting them lets a broadcast from one task write to a device whose
//! reader is parked in another task, with no shared lock on the socket.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingUpgrade, WebSocketConnection, WebSocketSession, WebSocketTransport,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_OUTBOUND_CAPACITY,
};

use std::fmt;
use std::sync::Arc;

/// Close code reported when the peer vanished without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The outbound capability of one live device connection.
///
/// Implementations must be cheap to call from any thread: `send_text`
/// is invoked while fanning out broadcasts and must not block on the
/// network. The WebSocket implementation queues frames on a channel
/// drained by a dedicated writer task.
pub trait Session: Send + Sync + 'static {
    /// Returns the unique identifier for this session.
    fn id(&self) -> ConnectionId;

    /// Returns `false` once the transport has closed (either side).
    fn is_open(&self) -> bool;

    /// Queues a text frame for delivery to the peer.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the session is no
    /// longer open, or [`TransportError::SendFailed`] if the frame could
    /// not be handed to the transport.
    fn send_text(&self, text: &str) -> Result<(), TransportError>;
}

/// A frame (or end-of-stream) received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame. Binary frames holding valid UTF-8 are surfaced here too.
    Text(String),

    /// The transport closed. No further frames will arrive.
    Closed {
        /// WebSocket close status code.
        code: u16,
        /// Human-readable reason, possibly empty.
        reason: String,
    },
}

/// Accepts new incoming connections.
///
/// Accepting only takes the raw connection off the listener. The
/// protocol handshake happens in [`Pending::upgrade`], which the server
/// runs on the connection's own task so a slow peer can't hold up the
/// accept loop.
pub trait Transport: Send + Sync + 'static {
    /// An accepted connection that hasn't finished its handshake.
    type Pending: Pending;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted connection waiting for its handshake.
pub trait Pending: Send + 'static {
    /// The connection produced once the handshake succeeds.
    type Connection: Connection;
    /// The error type for a failed or timed-out handshake.
    type Error: std::error::Error + Send + Sync;

    /// Completes the handshake.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// The inbound half of a single connection.
pub trait Connection: Send + 'static {
    /// The shareable outbound handle for this connection.
    type Session: Session;
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Receives the next frame from the peer.
    ///
    /// Returns [`Inbound::Closed`] exactly once when the connection ends
    /// cleanly; an `Err` means it ended abnormally.
    async fn recv(&mut self) -> Result<Inbound, Self::Error>;

    /// Returns the outbound handle shared with the rest of the server.
    fn session(&self) -> &Arc<Self::Session>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId {
        self.session().id()
    }
}
