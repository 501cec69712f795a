//! The signaling hub for Signalhub.
//!
//! Devices open a long-lived connection, present a token, and once it
//! verifies they are grouped under their account. Other subsystems then
//! push small notifications to every device of an account at once.
//!
//! # Key types
//!
//! - [`Hub`] — the authentication state machine and broadcast entry point
//! - [`Dispatcher`] — encodes payloads and writes them to sessions
//! - [`LifecycleListeners`] / [`LifecycleEvent`] — connect/disconnect hooks
//! - [`HubAvailability`] — lets subsystems wait for the hub to be built

mod availability;
mod dispatch;
mod error;
mod events;
mod hub;

pub use availability::{AvailabilityToken, HubAvailability};
pub use dispatch::Dispatcher;
pub use error::HubError;
pub use events::{LifecycleEvent, LifecycleListeners, SubscriptionId};
pub use hub::Hub;
