//! Messaging-client capability used by sessiond.
//!
//! The concrete client that talks to the messaging service is opaque to the
//! session core. This crate defines the seam it is driven through
//! ([`MessagingClient`], [`ClientConnector`]) and ships two connectors:
//!
//! * [`driver::DriverConnector`] runs one external driver process per session
//!   and speaks the JSON-lines protocol from `sessiond-protocol`.
//! * [`fake::FakeConnector`] is an in-memory, scriptable connector for tests.

pub mod client;
pub mod driver;
pub mod error;
pub mod fake;

pub use client::{AuthStrategy, ClientConnector, ClientEvent, ClientOptions, ClientParts, MessagingClient};
pub use error::{ClientError, Result};
