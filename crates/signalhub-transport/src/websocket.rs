//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Connection, ConnectionId, Inbound, Pending, Session, Transport,
    TransportError, CLOSE_ABNORMAL, CLOSE_NO_STATUS,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// How long a peer gets to complete the HTTP upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames queued per session before sends start failing.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// When a route is set, upgrade requests for any other path are refused
/// with `404 Not Found` during the HTTP handshake.
pub struct WebSocketTransport {
    listener: TcpListener,
    route: Option<String>,
    handshake_timeout: Duration,
    outbound_capacity: usize,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self {
            listener,
            route: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        })
    }

    /// Restricts upgrades to the given request path (e.g. `/api/v1/connect`).
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Sets how long a peer may take to finish the upgrade.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets how many frames may wait for a slow peer. Clamped to at least 1.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Pending = PendingUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        tracing::debug!(%addr, "accepted TCP connection");
        Ok(PendingUpgrade {
            stream,
            addr,
            route: self.route.clone(),
            timeout: self.handshake_timeout,
            capacity: self.outbound_capacity,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP connection that hasn't sent its HTTP upgrade yet.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
    route: Option<String>,
    timeout: Duration,
    capacity: usize,
}

impl PendingUpgrade {
    /// Returns the peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Pending for PendingUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            addr,
            route,
            timeout,
            capacity,
        } = self;

        let check_route = move |req: &Request, resp: Response| {
            match route {
                Some(expected) if req.uri().path() != expected => {
                    tracing::warn!(
                        path = req.uri().path(),
                        %expected,
                        "rejecting upgrade for unknown route"
                    );
                    let mut err =
                        ErrorResponse::new(Some("not found".to_string()));
                    *err.status_mut() = StatusCode::NOT_FOUND;
                    Err(err)
                }
                _ => Ok(resp),
            }
        };

        let ws = tokio::time::timeout(
            timeout,
            tokio_tungstenite::accept_hdr_async(stream, check_route),
        )
        .await
        .map_err(|_| {
            tracing::debug!(%addr, ?timeout, "handshake timed out");
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "handshake timed out",
            ))
        })?
        .map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::spawn(id, ws, capacity))
    }
}

/// The inbound half of a WebSocket connection.
///
/// Owns the read side of the socket; the write side lives in a writer
/// task fed by the [`WebSocketSession`] handle.
pub struct WebSocketConnection {
    session: Arc<WebSocketSession>,
    stream: SplitStream<WsStream>,
}

impl WebSocketConnection {
    fn spawn(id: ConnectionId, ws: WsStream, capacity: usize) -> Self {
        let (sink, stream) = ws.split();
        let (outbound, rx) = mpsc::channel(capacity);
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_loop(id, sink, rx, Arc::clone(&open)));

        Self {
            session: Arc::new(WebSocketSession { id, outbound, open }),
            stream,
        }
    }

    /// Sends a close frame to the peer and marks the session closed.
    pub fn close(&self) {
        self.session.close();
    }
}

impl Connection for WebSocketConnection {
    type Session = WebSocketSession;
    type Error = TransportError;

    async fn recv(&mut self) -> Result<Inbound, Self::Error> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Inbound::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    match String::from_utf8(data.to_vec()) {
                        Ok(text) => return Ok(Inbound::Text(text)),
                        Err(_) => {
                            tracing::debug!(
                                id = %self.session.id,
                                "skipping non-UTF-8 binary frame"
                            );
                            continue;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    self.session.mark_closed();
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    return Ok(Inbound::Closed { code, reason });
                }
                None => {
                    self.session.mark_closed();
                    return Ok(Inbound::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    });
                }
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    self.session.mark_closed();
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    fn session(&self) -> &Arc<Self::Session> {
        &self.session
    }
}

/// The outbound half of a WebSocket connection.
///
/// Frames are queued on a bounded channel, so `send_text` never waits
/// on the network. A peer that stops reading fills its queue, and
/// further sends fail with [`TransportError::QueueFull`].
#[derive(Debug)]
pub struct WebSocketSession {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
}

impl WebSocketSession {
    fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Queues a close frame and marks the session closed.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            // A full queue drops the close frame; the writer still stops
            // once every sender is gone.
            let _ = self.outbound.try_send(Message::Close(None));
        }
    }
}

impl Session for WebSocketSession {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }

    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        self.outbound
            .try_send(Message::text(text.to_owned()))
            .map_err(|e| match e {
                TrySendError::Full(_) => {
                    TransportError::QueueFull(self.id.to_string())
                }
                TrySendError::Closed(_) => {
                    TransportError::SendFailed(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "writer task has stopped",
                    ))
                }
            })
    }
}

/// Drains queued frames into the socket until the queue closes, a close
/// frame is written, or a write fails.
async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Message>,
    open: Arc<AtomicBool>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(%id, error = %e, "websocket write failed");
            open.store(false, Ordering::Release);
            break;
        }
        if closing {
            break;
        }
    }
    tracing::debug!(%id, "writer task finished");
}
