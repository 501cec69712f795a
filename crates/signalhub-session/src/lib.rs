//! Device session bookkeeping for Signalhub.
//!
//! This crate answers two questions for the hub:
//!
//! 1. **Who is this device?** — the [`Authenticator`] trait turns an
//!    opaque token into an [`AccountId`](signalhub_protocol::AccountId).
//! 2. **Which devices belong to which account?** — the
//!    [`ConnectionRegistry`] keeps the two-way mapping between live
//!    sessions and accounts.
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub Layer (above)  ← drives the auth state machine, fans out broadcasts
//!     ↕
//! Session Layer (this crate)  ← identity and connection bookkeeping
//!     ↕
//! Protocol / Transport (below)  ← AccountId, Session handles
//! ```

mod auth;
mod error;
mod registry;
mod state;

pub use auth::Authenticator;
pub use error::SessionError;
pub use registry::ConnectionRegistry;
pub use state::AuthState;
