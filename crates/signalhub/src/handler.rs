//! Per-connection handler: feeds transport events into the hub.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Report the connect to the hub
//!   2. Loop: receive text frames → `Hub::handle_message`
//!   3. On close or read error → `Hub::handle_close`

use std::sync::Arc;

use signalhub_hub::Hub;
use signalhub_protocol::Codec;
use signalhub_session::{AuthState, Authenticator};
use signalhub_transport::{Connection, Inbound, Session, CLOSE_ABNORMAL};

/// Drop guard that reports the close to the hub when the handler exits.
///
/// This ensures cleanup happens even if the handler panics or its task
/// is cancelled. `Hub::handle_close` is synchronous, so it runs right
/// here in `drop`.
struct CloseGuard<S: Session, A: Authenticator, C: Codec> {
    session: Arc<S>,
    hub: Arc<Hub<S, A, C>>,
    closed: bool,
}

impl<S: Session, A: Authenticator, C: Codec> CloseGuard<S, A, C> {
    fn close(&mut self, code: u16, reason: &str) {
        if !self.closed {
            self.closed = true;
            self.hub.handle_close(&self.session, code, reason);
        }
    }
}

impl<S: Session, A: Authenticator, C: Codec> Drop for CloseGuard<S, A, C> {
    fn drop(&mut self) {
        self.close(CLOSE_ABNORMAL, "handler exited");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<Conn, A, C>(
    mut conn: Conn,
    hub: Arc<Hub<Conn::Session, A, C>>,
) where
    Conn: Connection,
    A: Authenticator,
    C: Codec,
{
    let id = conn.id();
    let session = Arc::clone(conn.session());

    hub.handle_connect(&session);
    let mut guard = CloseGuard {
        session: Arc::clone(&session),
        hub: Arc::clone(&hub),
        closed: false,
    };

    loop {
        match conn.recv().await {
            Ok(Inbound::Text(text)) => {
                if hub.handle_message(&session, &text) == AuthState::Closed {
                    break;
                }
            }
            Ok(Inbound::Closed { code, reason }) => {
                guard.close(code, &reason);
                break;
            }
            Err(e) => {
                tracing::debug!(%id, error = %e, "recv error");
                guard.close(CLOSE_ABNORMAL, &e.to_string());
                break;
            }
        }
    }

    // guard drops here → close reported if it wasn't already.
}
