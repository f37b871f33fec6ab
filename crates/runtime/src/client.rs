//! The messaging-client seam.
//!
//! Callback-style subscriptions on the underlying client are modeled as a
//! typed event channel: a connector hands back the client together with the
//! receiving end of its events, and whoever owns the receiver decides how the
//! events are persisted or forwarded.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sessiond_protocol::AuthBlob;
use tokio::sync::mpsc;

use crate::error::Result;

/// How a client should authenticate on startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
	/// Start a fresh login flow.
	Fresh,
	/// Resume from previously persisted auth state.
	Restore(AuthBlob),
}

impl AuthStrategy {
	pub fn from_blob(blob: Option<AuthBlob>) -> Self {
		match blob {
			Some(blob) => Self::Restore(blob),
			None => Self::Fresh,
		}
	}

	pub fn blob(&self) -> Option<&AuthBlob> {
		match self {
			Self::Fresh => None,
			Self::Restore(blob) => Some(blob),
		}
	}
}

/// Construction parameters for one session's client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
	pub session_id: String,
	pub auth: AuthStrategy,
	/// Period at which the client re-emits [`ClientEvent::AuthBackup`].
	pub backup_interval: Duration,
}

/// Events produced by a running client, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
	/// The client became ready again after a disconnect.
	Ready,
	/// Fresh login material to present to the end user.
	Qr(String),
	/// Updated auth state that must be persisted.
	AuthBackup(AuthBlob),
	/// The service revoked or rejected the session's auth.
	AuthFailure(String),
	/// The connection to the service dropped.
	Disconnected(String),
	/// An inbound message payload.
	Message(Value),
}

/// A client bound to one session.
#[async_trait]
pub trait MessagingClient: Send + 'static {
	/// Starts the client and resolves once it reports startup success or failure.
	async fn initialize(&mut self) -> Result<()>;

	/// Releases every resource held by the client. Safe to call more than once.
	async fn shutdown(&mut self) -> Result<()>;
}

/// A client together with the receiving end of its event stream.
///
/// The stream ends when the client goes away.
pub struct ClientParts {
	pub client: Box<dyn MessagingClient>,
	pub events: mpsc::UnboundedReceiver<ClientEvent>,
}

/// Factory for the opaque messaging-client capability.
#[async_trait]
pub trait ClientConnector: Send + Sync + 'static {
	/// Constructs (but does not start) a client for `options.session_id`.
	async fn connect(&self, options: ClientOptions) -> Result<ClientParts>;
}
