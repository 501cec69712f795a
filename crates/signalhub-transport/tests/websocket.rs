//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket server and client to verify
//! that frames actually flow over the network, that the outbound
//! session handle works from outside the reading task, and that the
//! route filter refuses unknown paths.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use signalhub_transport::{
        Connection, Inbound, Pending, Session, Transport, TransportError,
        WebSocketConnection, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port and returns the transport plus its address.
    async fn bind(route: Option<&str>) -> (WebSocketTransport, String) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        if let Some(route) = route {
            transport = transport.with_route(route);
        }
        let addr = transport
            .local_addr()
            .expect("should have local addr")
            .to_string();
        (transport, addr)
    }

    /// Accepts one connection in the background while a client connects.
    async fn connect_pair(
        path: &str,
    ) -> (WebSocketConnection, ClientWs) {
        let (mut transport, addr) = bind(Some("/api/v1/connect")).await;
        let server_handle = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.upgrade().await.expect("should upgrade")
        });

        let url = format!("ws://{addr}{path}");
        let (client, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");
        (server_conn, client)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive_text() {
        let (mut server_conn, mut client_ws) =
            connect_pair("/api/v1/connect").await;

        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.session().is_open());

        // --- Server sends through the shared session handle ---
        server_conn
            .session()
            .send_text(r#"{"authorized":true}"#)
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"authorized":true}"#);

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text(r#"{"auth":"tok"}"#.to_string()))
            .await
            .unwrap();

        let received = server_conn.recv().await.expect("recv should succeed");
        assert_eq!(received, Inbound::Text(r#"{"auth":"tok"}"#.into()));
    }

    #[tokio::test]
    async fn test_websocket_binary_utf8_is_surfaced_as_text() {
        let (mut server_conn, mut client_ws) =
            connect_pair("/api/v1/connect").await;

        client_ws
            .send(Message::Binary(b"{\"auth\":\"x\"}".to_vec().into()))
            .await
            .unwrap();

        let received = server_conn.recv().await.expect("recv should succeed");
        assert_eq!(received, Inbound::Text("{\"auth\":\"x\"}".into()));
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_closed_on_client_close() {
        let (mut server_conn, mut client_ws) =
            connect_pair("/api/v1/connect").await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(
            matches!(result, Inbound::Closed { .. }),
            "should report close, got {result:?}"
        );
        assert!(!server_conn.session().is_open());
    }

    #[tokio::test]
    async fn test_websocket_send_after_close_fails() {
        let (server_conn, mut client_ws) =
            connect_pair("/api/v1/connect").await;

        server_conn.close();

        let result = server_conn.session().send_text("late");
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));

        // The client should observe the close frame.
        let next = tokio::time::timeout(Duration::from_secs(2), client_ws.next())
            .await
            .expect("should not time out");
        assert!(matches!(next, Some(Ok(Message::Close(_))) | None));
    }

    #[tokio::test]
    async fn test_websocket_rejects_unknown_route() {
        let (mut transport, addr) = bind(Some("/api/v1/connect")).await;
        let server_handle = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.upgrade().await
        });

        let url = format!("ws://{addr}/api/v0/connect");
        let client = tokio_tungstenite::connect_async(&url).await;
        assert!(client.is_err(), "upgrade to wrong path should fail");

        let accepted = server_handle.await.expect("task should complete");
        assert!(matches!(accepted, Err(TransportError::AcceptFailed(_))));
    }

    #[tokio::test]
    async fn test_websocket_stalled_handshake_times_out() {
        let (transport, addr) = bind(Some("/api/v1/connect")).await;
        let mut transport =
            transport.with_handshake_timeout(Duration::from_millis(100));

        // Opens TCP but never sends the HTTP upgrade.
        let _silent = tokio::net::TcpStream::connect(&addr)
            .await
            .expect("tcp connect");
        let pending = transport.accept().await.expect("should accept");

        let result =
            tokio::time::timeout(Duration::from_secs(2), pending.upgrade())
                .await
                .expect("upgrade should give up on its own");
        match result {
            Err(TransportError::AcceptFailed(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::TimedOut);
            }
            Err(other) => panic!("expected a timeout, got {other:?}"),
            Ok(_) => panic!("expected a timeout, got a connection"),
        }
    }

    #[tokio::test]
    async fn test_websocket_accept_does_not_wait_for_handshake() {
        let (mut transport, addr) = bind(Some("/api/v1/connect")).await;

        let _silent = tokio::net::TcpStream::connect(&addr)
            .await
            .expect("tcp connect");
        let first = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept returns before any handshake bytes arrive");

        assert!(first.is_ok());
    }
}
