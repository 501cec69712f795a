//! Sync relay: tells every device of an account how many of its devices
//! are online, whenever one comes or goes.
//!
//! Run with `RUST_LOG=debug cargo run -p sync-relay` and connect to
//! `ws://127.0.0.1:8080/api/v1/connect`, sending `{"auth":"user:alice"}`.
//! Override the address or version with `SIGNALHUB_BIND_ADDR` and
//! `SIGNALHUB_VERSION`.

use std::sync::{Arc, Weak};

use serde::Serialize;
use signalhub::prelude::*;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Pushed to every device of an account when its device set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Presence {
    Devices { online: usize },
}

// ---------------------------------------------------------------------------
// Presence subsystem
// ---------------------------------------------------------------------------

type RelayHub = ServerHub<DevAuth>;

/// Wires the presence broadcaster into the hub once it exists.
///
/// The listener keeps only a `Weak` handle, so the hub (which owns the
/// listener) is still dropped normally.
fn install_presence(availability: &HubAvailability<RelayHub>) {
    availability.on_available(|hub| {
        let weak: Weak<RelayHub> = Arc::downgrade(hub);
        hub.subscribe(move |event| {
            let Some(hub) = weak.upgrade() else { return };
            let account = event.account_id().as_str();
            let online = hub.device_count_for(account);
            let delivered = hub.broadcast(account, &Presence::Devices { online });
            tracing::debug!(account, online, delivered, "presence pushed");
        });
    });
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// Development authenticator: `user:<account>` signs in as `<account>`.
struct DevAuth;

impl Authenticator for DevAuth {
    fn verify(&self, token: &str) -> Result<AccountId, SessionError> {
        token
            .strip_prefix("user:")
            .filter(|account| !account.is_empty())
            .map(AccountId::from)
            .ok_or_else(|| SessionError::AuthFailed("expected user:<account>".into()))
    }
}

async fn start(config: HubConfig) -> Result<SignalHubServer<DevAuth>, SignalhubError> {
    let availability = HubAvailability::new();
    install_presence(&availability);

    let server = signalhub::builder().config(config).build(DevAuth).await?;
    server.publish(&availability)?;
    Ok(server)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    signalhub::init_tracing();

    let config = HubConfig::from_source(&EnvConfiguration::new());
    tracing::info!(addr = %config.bind_addr, route = %config.route(), "starting sync relay");

    let server = start(config).await?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start_relay() -> String {
        let config = HubConfig {
            bind_addr: "127.0.0.1:0".into(),
            ..HubConfig::default()
        };
        let server = start(config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    async fn ws(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/connect"))
            .await
            .unwrap();
        ws
    }

    async fn recv(ws: &mut Ws) -> serde_json::Value {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await.expect("timeout").unwrap().unwrap();
        serde_json::from_str(msg.into_text().unwrap().as_str()).unwrap()
    }

    async fn sign_in(ws: &mut Ws, token: &str) -> serde_json::Value {
        ws.send(Message::text(format!(r#"{{"auth":"{token}"}}"#))).await.unwrap();
        recv(ws).await
    }

    #[test]
    fn test_dev_auth_accepts_user_prefix_only() {
        assert_eq!(DevAuth.verify("user:alice").unwrap().as_str(), "alice");
        assert!(DevAuth.verify("user:").is_err());
        assert!(DevAuth.verify("alice").is_err());
    }

    #[test]
    fn test_presence_wire_format() {
        let text = serde_json::to_string(&Presence::Devices { online: 2 }).unwrap();
        assert_eq!(text, r#"{"event":"devices","online":2}"#);
    }

    #[tokio::test]
    async fn test_second_device_announced_to_both() {
        let addr = start_relay().await;
        let mut phone = ws(&addr).await;
        let mut laptop = ws(&addr).await;

        assert_eq!(sign_in(&mut phone, "user:alice").await["authorized"], true);
        assert_eq!(recv(&mut phone).await["online"], 1);

        assert_eq!(sign_in(&mut laptop, "user:alice").await["authorized"], true);
        assert_eq!(recv(&mut laptop).await["online"], 2);
        assert_eq!(recv(&mut phone).await["online"], 2);

        laptop.close(None).await.unwrap();
        assert_eq!(recv(&mut phone).await["online"], 1);
    }

    #[tokio::test]
    async fn test_other_accounts_not_told() {
        let addr = start_relay().await;
        let mut alice = ws(&addr).await;
        let mut bob = ws(&addr).await;

        sign_in(&mut alice, "user:alice").await;
        assert_eq!(recv(&mut alice).await["online"], 1);
        sign_in(&mut bob, "user:bob").await;
        assert_eq!(recv(&mut bob).await["online"], 1);

        // Alice's next frame is her own denial, not Bob's presence.
        assert_eq!(sign_in(&mut alice, "nope").await["authorized"], false);
    }
}
