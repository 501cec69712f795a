//! # Signalhub
//!
//! Real-time signaling hub for multi-device accounts.
//!
//! Devices hold a WebSocket open on `/api/{version}/connect`, send
//! `{"auth": "<token>"}`, and get `{"authorized": true|false}` back. Once
//! authorized, they receive whatever the rest of the server broadcasts to
//! their account.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signalhub::prelude::*;
//!
//! # async fn run() -> Result<(), SignalhubError> {
//! signalhub::init_tracing();
//!
//! let server = signalhub::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(|token: &str| -> Option<AccountId> {
//!         token.strip_prefix("user:").map(AccountId::from)
//!     })
//!     .await?;
//!
//! server.hub().subscribe(|event| {
//!     tracing::info!(account = %event.account_id(), "lifecycle event");
//! });
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, Configuration, EnvConfiguration, HubConfig, connect_route};
pub use error::SignalhubError;
pub use server::{ServerHub, SignalHubServer, SignalHubServerBuilder, builder};

/// Installs a `tracing` subscriber that writes to stderr.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Calling it
/// more than once is harmless.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Common imports for building a signaling server.
pub mod prelude {
    pub use crate::config::{Configuration, EnvConfiguration, HubConfig};
    pub use crate::{ServerHub, SignalHubServer, SignalHubServerBuilder, SignalhubError};

    pub use signalhub_hub::{
        Dispatcher, Hub, HubAvailability, LifecycleEvent, SubscriptionId,
    };
    pub use signalhub_protocol::{AccountId, AuthResponse, ControlMessage};
    pub use signalhub_session::{AuthState, Authenticator, SessionError};
    pub use signalhub_transport::{ConnectionId, Session, WebSocketSession};
}
