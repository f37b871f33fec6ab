//! Client construction and startup.
//!
//! The factory never returns an error: every way a bring-up can go wrong
//! (construction, initialize, timeout) resolves to a failure reason that the
//! manager records on the session's handle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sessiond_protocol::AuthBlob;
use sessiond_runtime::{AuthStrategy, ClientConnector, ClientEvent, ClientOptions, MessagingClient};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{DEFAULT_BACKUP_INTERVAL_MS, DEFAULT_STARTUP_TIMEOUT_MS};

/// Builds and starts messaging clients for sessions.
#[derive(Clone)]
pub struct ClientFactory {
	connector: Arc<dyn ClientConnector>,
	backup_interval: Duration,
	startup_timeout: Duration,
}

/// Outcome of [`ClientFactory::build`].
pub enum BuildOutcome {
	/// The client exists and is starting. `events` yields everything it emits,
	/// including events produced while startup is still in progress.
	Started {
		startup: ClientStartup,
		events: mpsc::UnboundedReceiver<ClientEvent>,
	},
	/// The client could not be constructed.
	Failed { reason: String },
}

/// A constructed client whose startup has not been awaited yet.
pub struct ClientStartup {
	session_id: String,
	client: Box<dyn MessagingClient>,
	timeout: Duration,
}

pub enum StartupResult {
	Ready(Box<dyn MessagingClient>),
	Failed { reason: String },
}

impl fmt::Debug for StartupResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Ready(_) => f.write_str("Ready"),
			Self::Failed { reason } => f.debug_struct("Failed").field("reason", reason).finish(),
		}
	}
}

impl ClientFactory {
	pub fn new(connector: Arc<dyn ClientConnector>) -> Self {
		Self {
			connector,
			backup_interval: Duration::from_millis(DEFAULT_BACKUP_INTERVAL_MS),
			startup_timeout: Duration::from_millis(DEFAULT_STARTUP_TIMEOUT_MS),
		}
	}

	pub fn with_backup_interval(mut self, interval: Duration) -> Self {
		self.backup_interval = interval;
		self
	}

	pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
		self.startup_timeout = timeout;
		self
	}

	pub fn backup_interval(&self) -> Duration {
		self.backup_interval
	}

	pub fn startup_timeout(&self) -> Duration {
		self.startup_timeout
	}

	/// Constructs a client for `session_id`, resuming from `existing_auth` when given.
	pub async fn build(&self, session_id: &str, existing_auth: Option<AuthBlob>) -> BuildOutcome {
		let options = ClientOptions {
			session_id: session_id.to_string(),
			auth: AuthStrategy::from_blob(existing_auth),
			backup_interval: self.backup_interval,
		};
		let resumed = matches!(options.auth, AuthStrategy::Restore(_));

		match self.connector.connect(options).await {
			Ok(parts) => {
				debug!(target = "sessiond.session", session_id, resumed, "client constructed");
				BuildOutcome::Started {
					startup: ClientStartup {
						session_id: session_id.to_string(),
						client: parts.client,
						timeout: self.startup_timeout,
					},
					events: parts.events,
				}
			}
			Err(err) => {
				warn!(target = "sessiond.session", session_id, error = %err, "client construction failed");
				BuildOutcome::Failed { reason: err.to_string() }
			}
		}
	}
}

impl ClientStartup {
	/// Runs `initialize` under the startup timeout.
	///
	/// On failure the client is shut down before returning.
	pub async fn wait(mut self) -> StartupResult {
		let reason = match tokio::time::timeout(self.timeout, self.client.initialize()).await {
			Ok(Ok(())) => return StartupResult::Ready(self.client),
			Ok(Err(err)) => err.to_string(),
			Err(_) => format!("client startup timed out after {:?}", self.timeout),
		};

		if let Err(err) = self.client.shutdown().await {
			debug!(target = "sessiond.session", session_id = %self.session_id, error = %err, "shutdown after failed startup errored");
		}
		StartupResult::Failed { reason }
	}
}
