//! `SignalHubServer` builder and server loop.
//!
//! This is the entry point for running a signaling server. It ties
//! together all the layers: transport → protocol → session → hub.

use std::sync::Arc;
use std::time::Duration;

use signalhub_hub::{Hub, HubAvailability};
use signalhub_protocol::JsonCodec;
use signalhub_session::Authenticator;
use signalhub_transport::{
    Pending, Transport, WebSocketSession, WebSocketTransport,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_OUTBOUND_CAPACITY,
};

use crate::config::{connect_route, Configuration, HubConfig};
use crate::handler::handle_connection;
use crate::SignalhubError;

/// The hub type a WebSocket server runs.
pub type ServerHub<A> = Hub<WebSocketSession, A, JsonCodec>;

/// Builder for configuring and starting a signaling server.
///
/// # Example
///
/// ```rust,ignore
/// use signalhub::prelude::*;
///
/// let server = signalhub::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct SignalHubServerBuilder {
    config: HubConfig,
    handshake_timeout: Duration,
    outbound_capacity: usize,
}

/// Creates a new server builder with default settings.
pub fn builder() -> SignalHubServerBuilder {
    SignalHubServerBuilder::new()
}

impl SignalHubServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the API version used in the connect route.
    pub fn version(mut self, version: &str) -> Self {
        self.config.version = version.to_string();
        self
    }

    /// Sets how long a device may take to finish the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets how many frames may queue for a device that isn't reading.
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: HubConfig) -> Self {
        self.config = config;
        self
    }

    /// Reads the configuration from a settings source, keeping defaults
    /// for anything unset.
    pub fn from_source(mut self, source: &impl Configuration) -> Self {
        self.config = HubConfig::from_source(source);
        self
    }

    /// Binds the listener and builds the hub.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// Fails if the version is empty or the address can't be bound.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<SignalHubServer<A>, SignalhubError> {
        let route = connect_route(&self.config)?;
        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_route(route.clone())
            .with_handshake_timeout(self.handshake_timeout)
            .with_outbound_capacity(self.outbound_capacity);

        tracing::info!(%route, "signaling hub configured");

        Ok(SignalHubServer {
            transport,
            hub: Arc::new(Hub::new(auth)),
            route,
        })
    }
}

impl Default for SignalHubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A signaling server ready to accept devices.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SignalHubServer<A: Authenticator> {
    transport: WebSocketTransport,
    hub: Arc<ServerHub<A>>,
    route: String,
}

impl<A: Authenticator> SignalHubServer<A> {
    /// Returns the hub, for broadcasting and subscribing.
    pub fn hub(&self) -> &Arc<ServerHub<A>> {
        &self.hub
    }

    /// Returns the path devices must connect to.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Hands the hub to subsystems waiting on `availability`.
    ///
    /// # Errors
    /// Fails if another hub was already published there.
    pub fn publish(
        &self,
        availability: &HubAvailability<ServerHub<A>>,
    ) -> Result<(), SignalhubError> {
        availability.publish(Arc::clone(&self.hub))?;
        Ok(())
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a task for each device.
    /// The WebSocket upgrade runs on that task, so a peer that stalls
    /// mid-handshake only holds up itself. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), SignalhubError> {
        tracing::info!(route = %self.route, "signaling hub running");

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let hub = Arc::clone(&self.hub);
                    tokio::spawn(async move {
                        match pending.upgrade().await {
                            Ok(conn) => handle_connection(conn, hub).await,
                            Err(e) => {
                                tracing::debug!(error = %e, "upgrade failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}
