//! Fake connector for exercising session orchestration without a driver.
//!
//! Provides an in-memory capability whose startup outcome and timing are
//! scripted per session id.
//!
//! # Example
//!
//! ```ignore
//! let connector = FakeConnector::new();
//! connector.script("alice", FakeScript::ready_after(Duration::from_millis(200)));
//! connector.script("bob", FakeScript::fail("bad credentials"));
//!
//! // ... bring sessions up through the session manager ...
//!
//! connector.emit("alice", ClientEvent::AuthBackup(AuthBlob::from("state")));
//! assert_eq!(connector.live_clients(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::{ClientConnector, ClientEvent, ClientOptions, ClientParts, MessagingClient};
use crate::error::{ClientError, Result};

/// Scripted startup behavior for one session.
#[derive(Debug, Clone, Default)]
pub struct FakeScript {
	/// How long `initialize` takes before resolving.
	pub startup_delay: Duration,
	/// When set, `initialize` fails with this reason.
	pub failure: Option<String>,
	/// Events emitted at the start of `initialize`, before it resolves.
	pub startup_events: Vec<ClientEvent>,
	/// How long `shutdown` takes before releasing the client.
	pub shutdown_delay: Duration,
}

impl FakeScript {
	/// Startup succeeds after `delay`.
	pub fn ready_after(delay: Duration) -> Self {
		Self {
			startup_delay: delay,
			..Self::default()
		}
	}

	/// Startup fails immediately with `reason`.
	pub fn fail(reason: impl Into<String>) -> Self {
		Self {
			failure: Some(reason.into()),
			..Self::default()
		}
	}

	/// Startup fails with `reason` after `delay`.
	pub fn fail_after(delay: Duration, reason: impl Into<String>) -> Self {
		Self {
			startup_delay: delay,
			failure: Some(reason.into()),
			..Self::default()
		}
	}

	/// Adds an event emitted while startup is in progress.
	pub fn with_startup_event(mut self, event: ClientEvent) -> Self {
		self.startup_events.push(event);
		self
	}

	pub fn with_shutdown_delay(mut self, delay: Duration) -> Self {
		self.shutdown_delay = delay;
		self
	}
}

#[derive(Default)]
struct FakeState {
	default_script: Mutex<FakeScript>,
	scripts: Mutex<HashMap<String, FakeScript>>,
	connects: Mutex<Vec<ClientOptions>>,
	live: Mutex<HashMap<String, (u64, mpsc::UnboundedSender<ClientEvent>)>>,
	next_client_id: AtomicU64,
	released: AtomicUsize,
	shutdowns: AtomicUsize,
}

impl FakeState {
	fn release(&self, session_id: &str, client_id: u64) {
		let mut live = self.live.lock();
		if live.get(session_id).is_some_and(|(id, _)| *id == client_id) {
			live.remove(session_id);
		}
		self.released.fetch_add(1, Ordering::SeqCst);
	}
}

/// In-memory [`ClientConnector`] with per-session scripts and inspection helpers.
#[derive(Clone, Default)]
pub struct FakeConnector {
	state: Arc<FakeState>,
}

impl FakeConnector {
	/// Creates a connector whose clients start immediately and successfully.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the script used for `session_id`.
	pub fn script(&self, session_id: &str, script: FakeScript) {
		self.state.scripts.lock().insert(session_id.to_string(), script);
	}

	/// Sets the script used for sessions without their own script.
	pub fn set_default_script(&self, script: FakeScript) {
		*self.state.default_script.lock() = script;
	}

	/// Emits `event` from the current client of `session_id`.
	///
	/// Returns `false` when no client is live for that session.
	pub fn emit(&self, session_id: &str, event: ClientEvent) -> bool {
		match self.state.live.lock().get(session_id) {
			Some((_, tx)) => tx.send(event).is_ok(),
			None => false,
		}
	}

	/// Drops the connector's sender for `session_id`, simulating the capability
	/// going away without being asked to.
	pub fn close(&self, session_id: &str) -> bool {
		self.state.live.lock().remove(session_id).is_some()
	}

	/// Number of clients constructed for `session_id`.
	pub fn connect_count(&self, session_id: &str) -> usize {
		self.state.connects.lock().iter().filter(|o| o.session_id == session_id).count()
	}

	/// Total number of clients constructed.
	pub fn total_connects(&self) -> usize {
		self.state.connects.lock().len()
	}

	/// Options passed to the most recent client built for `session_id`.
	pub fn last_options(&self, session_id: &str) -> Option<ClientOptions> {
		self.state.connects.lock().iter().rev().find(|o| o.session_id == session_id).cloned()
	}

	/// Clients constructed and not yet released.
	pub fn live_clients(&self) -> usize {
		self.total_connects() - self.state.released.load(Ordering::SeqCst)
	}

	/// Number of explicit `shutdown` calls observed.
	pub fn shutdown_calls(&self) -> usize {
		self.state.shutdowns.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ClientConnector for FakeConnector {
	async fn connect(&self, options: ClientOptions) -> Result<ClientParts> {
		let script = self
			.state
			.scripts
			.lock()
			.get(&options.session_id)
			.cloned()
			.unwrap_or_else(|| self.state.default_script.lock().clone());

		let client_id = self.state.next_client_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = mpsc::unbounded_channel();
		self.state.live.lock().insert(options.session_id.clone(), (client_id, tx));
		self.state.connects.lock().push(options.clone());

		let client = FakeClient {
			session_id: options.session_id,
			client_id,
			script,
			state: Arc::clone(&self.state),
			released: false,
		};

		Ok(ClientParts {
			client: Box::new(client),
			events: rx,
		})
	}
}

struct FakeClient {
	session_id: String,
	client_id: u64,
	script: FakeScript,
	state: Arc<FakeState>,
	released: bool,
}

impl FakeClient {
	fn release(&mut self) {
		if !self.released {
			self.released = true;
			self.state.release(&self.session_id, self.client_id);
		}
	}
}

#[async_trait]
impl MessagingClient for FakeClient {
	async fn initialize(&mut self) -> Result<()> {
		let events: Vec<ClientEvent> = self.script.startup_events.drain(..).collect();
		if let Some((id, tx)) = self.state.live.lock().get(&self.session_id) {
			if *id == self.client_id {
				for event in events {
					let _ = tx.send(event);
				}
			}
		}

		if !self.script.startup_delay.is_zero() {
			tokio::time::sleep(self.script.startup_delay).await;
		}

		match &self.script.failure {
			Some(reason) => Err(ClientError::Startup(reason.clone())),
			None => Ok(()),
		}
	}

	async fn shutdown(&mut self) -> Result<()> {
		self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
		if !self.script.shutdown_delay.is_zero() {
			tokio::time::sleep(self.script.shutdown_delay).await;
		}
		self.release();
		Ok(())
	}
}

impl Drop for FakeClient {
	fn drop(&mut self) {
		self.release();
	}
}
