//! Message dispatch: encoding payloads and handing them to sessions.
//!
//! Nothing here returns an error. A payload that won't encode, a session
//! that has closed, or a socket that has broken is logged and counted as
//! "not delivered"; a broadcast keeps going to the remaining devices.
//! Re-sending is up to whoever asked for the send.

use std::sync::Arc;

use serde::Serialize;
use signalhub_protocol::{Codec, JsonCodec};
use signalhub_transport::Session;

/// Encodes payloads with `C` and writes them to sessions.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher<C = JsonCodec> {
    codec: C,
}

impl<C: Codec> Dispatcher<C> {
    /// Creates a dispatcher using the given codec.
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Returns the codec, which also decodes inbound control messages.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Sends one payload to one session.
    ///
    /// Closed sessions are skipped without encoding. Returns `true` if
    /// the frame was handed to the transport.
    pub fn send<S, T>(&self, session: &S, payload: &T) -> bool
    where
        S: Session,
        T: Serialize + ?Sized,
    {
        if !session.is_open() {
            tracing::debug!(id = %session.id(), "skipping send to closed session");
            return false;
        }

        match self.codec.encode(payload) {
            Ok(text) => self.send_text(session, &text),
            Err(e) => {
                tracing::error!(
                    id = %session.id(),
                    error = %e,
                    "unable to serialize message"
                );
                false
            }
        }
    }

    /// Sends one payload to every open session in `sessions`.
    ///
    /// The payload is encoded once and the same text goes to every
    /// recipient. A failed write to one session is logged and the loop
    /// moves on. Returns the number of sessions the frame was handed to.
    pub fn broadcast<S, T>(&self, sessions: &[Arc<S>], payload: &T) -> usize
    where
        S: Session,
        T: Serialize + ?Sized,
    {
        if sessions.is_empty() {
            return 0;
        }

        let text = match self.codec.encode(payload) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "unable to serialize broadcast");
                return 0;
            }
        };

        sessions
            .iter()
            .filter(|session| session.is_open())
            .filter(|session| self.send_text::<S>(session, &text))
            .count()
    }

    fn send_text<S: Session>(&self, session: &S, text: &str) -> bool {
        match session.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    id = %session.id(),
                    error = %e,
                    "unable to send message to session"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use serde::ser::Error as _;
    use signalhub_transport::{ConnectionId, TransportError};

    use super::*;

    /// Records frames; can be closed or made to fail on write.
    struct RecordingSession {
        id: ConnectionId,
        open: AtomicBool,
        broken: AtomicBool,
        frames: Mutex<Vec<String>>,
    }

    impl RecordingSession {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::new(id),
                open: AtomicBool::new(true),
                broken: AtomicBool::new(false),
                frames: Mutex::new(Vec::new()),
            })
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl Session for RecordingSession {
        fn id(&self) -> ConnectionId {
            self.id
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_text(&self, text: &str) -> Result<(), TransportError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "simulated",
                )));
            }
            self.frames.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(
            &self,
            _serializer: S,
        ) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("nope"))
        }
    }

    fn changed() -> serde_json::Value {
        serde_json::json!({ "event": "changed" })
    }

    #[test]
    fn test_send_writes_encoded_payload() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let session = RecordingSession::new(1);

        assert!(dispatcher.send(&*session, &changed()));

        assert_eq!(session.frames(), vec![r#"{"event":"changed"}"#]);
    }

    #[test]
    fn test_send_to_closed_session_is_noop() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let session = RecordingSession::new(1);
        session.open.store(false, Ordering::SeqCst);

        assert!(!dispatcher.send(&*session, &changed()));

        assert!(session.frames().is_empty());
    }

    #[test]
    fn test_send_encode_failure_is_absorbed() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let session = RecordingSession::new(1);

        assert!(!dispatcher.send(&*session, &Unencodable));

        assert!(session.frames().is_empty());
    }

    #[test]
    fn test_send_transport_failure_is_absorbed() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let session = RecordingSession::new(1);
        session.broken.store(true, Ordering::SeqCst);

        assert!(!dispatcher.send(&*session, &changed()));
    }

    #[test]
    fn test_broadcast_partial_failure_reaches_remaining_sessions() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let sessions: Vec<_> = (1..=4).map(RecordingSession::new).collect();
        sessions[1].broken.store(true, Ordering::SeqCst);

        let delivered = dispatcher.broadcast(&sessions, &changed());

        assert_eq!(delivered, 3);
        for (i, session) in sessions.iter().enumerate() {
            let expected = if i == 1 { 0 } else { 1 };
            assert_eq!(session.frames().len(), expected, "session {i}");
        }
    }

    #[test]
    fn test_broadcast_skips_closed_sessions() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let sessions: Vec<_> = (1..=2).map(RecordingSession::new).collect();
        sessions[0].open.store(false, Ordering::SeqCst);

        let delivered = dispatcher.broadcast(&sessions, &changed());

        assert_eq!(delivered, 1);
        assert!(sessions[0].frames().is_empty());
        assert_eq!(sessions[1].frames(), vec![r#"{"event":"changed"}"#]);
    }

    #[test]
    fn test_broadcast_encode_failure_sends_nothing() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let sessions: Vec<_> = (1..=2).map(RecordingSession::new).collect();

        assert_eq!(dispatcher.broadcast(&sessions, &Unencodable), 0);

        assert!(sessions.iter().all(|s| s.frames().is_empty()));
    }

    #[test]
    fn test_broadcast_empty_group_is_noop() {
        let dispatcher = Dispatcher::<JsonCodec>::default();
        let sessions: Vec<Arc<RecordingSession>> = Vec::new();

        assert_eq!(dispatcher.broadcast(&sessions, &changed()), 0);
    }
}
