//! Session lifecycle controller.
//!
//! Every bring-up runs as its own task: build the client, drive startup while
//! already pumping the client's events through the bridge, record the outcome
//! in the registry, then keep pumping until the event stream ends. Sessions
//! never wait on each other; the only shared critical section is the
//! registry's duplicate check.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::json;
use sessiond_protocol::{AuthBlob, EventType, SessionEvent, SessionStatus, SessionSummary};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info, warn};

use crate::bridge::{EventBridge, LinkState};
use crate::config::{HubConfig, RestorePolicy};
use crate::error::{HubError, Result};
use crate::factory::{BuildOutcome, ClientFactory, StartupResult};
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session_id::validate_session_id;
use crate::store::SessionStore;

const STREAM_CLOSED_REASON: &str = "client event stream closed";

/// Tunables for [`SessionManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
	pub restore_policy: RestorePolicy,
	/// Maximum bring-ups building at once during `restore_all`.
	pub max_concurrent_restores: Option<usize>,
}

impl From<&HubConfig> for ManagerOptions {
	fn from(config: &HubConfig) -> Self {
		Self {
			restore_policy: config.restore_policy,
			max_concurrent_restores: config.max_concurrent_restores,
		}
	}
}

/// Watcher for one started bring-up.
#[derive(Debug, Clone)]
pub struct BringUp {
	session_id: String,
	generation: u64,
	status: watch::Receiver<SessionStatus>,
	registry: Arc<SessionRegistry>,
}

impl BringUp {
	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Status right now.
	pub fn status(&self) -> SessionStatus {
		*self.status.borrow()
	}

	/// Resolves once startup reached `Ready`, `Failed` or `Stopped`.
	pub async fn settled(&self) -> SessionStatus {
		let mut status = self.status.clone();
		match status.wait_for(|s| s.is_settled()).await {
			Ok(current) => *current,
			Err(_) => SessionStatus::Stopped,
		}
	}

	/// Like [`settled`](Self::settled), but a session that did not become
	/// ready is an error.
	pub async fn ready(&self) -> Result<()> {
		match self.settled().await {
			SessionStatus::Ready => Ok(()),
			SessionStatus::Stopped => Err(HubError::NotFound(self.session_id.clone())),
			_ => {
				let reason = self
					.registry
					.lookup(&self.session_id)
					.ok()
					.and_then(|summary| summary.error)
					.unwrap_or_else(|| "startup failed".to_string());
				Err(HubError::ClientStartup {
					session_id: self.session_id.clone(),
					reason,
				})
			}
		}
	}
}

/// What `restore_all` did.
#[derive(Debug, Default)]
pub struct RestoreReport {
	/// Bring-ups started for persisted records.
	pub started: Vec<BringUp>,
	/// Records not started: already live, or stored under an invalid id.
	pub skipped: Vec<String>,
}

impl RestoreReport {
	pub fn is_empty(&self) -> bool {
		self.started.is_empty() && self.skipped.is_empty()
	}

	/// Waits for every started bring-up to settle.
	pub async fn settle_all(&self) -> Vec<(String, SessionStatus)> {
		join_all(self.started.iter().map(|b| async move { (b.session_id.clone(), b.settled().await) })).await
	}
}

struct ManagerInner {
	store: Arc<dyn SessionStore>,
	registry: Arc<SessionRegistry>,
	factory: ClientFactory,
	bridge: EventBridge,
	restore_policy: RestorePolicy,
	restore_limit: Option<Arc<Semaphore>>,
}

/// Orchestrates create, restore and teardown of sessions.
///
/// Cheap to clone; clones share the same registry, store and bridge.
#[derive(Clone)]
pub struct SessionManager {
	inner: Arc<ManagerInner>,
}

impl SessionManager {
	pub fn new(store: Arc<dyn SessionStore>, factory: ClientFactory, bridge: EventBridge, options: ManagerOptions) -> Self {
		let restore_limit = options.max_concurrent_restores.map(|n| Arc::new(Semaphore::new(n.max(1))));
		Self {
			inner: Arc::new(ManagerInner {
				store,
				registry: Arc::new(SessionRegistry::new()),
				factory,
				bridge,
				restore_policy: options.restore_policy,
				restore_limit,
			}),
		}
	}

	pub fn store(&self) -> &Arc<dyn SessionStore> {
		&self.inner.store
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.inner.registry
	}

	pub fn bridge(&self) -> &EventBridge {
		&self.inner.bridge
	}

	/// Starts a bring-up for every persisted session.
	///
	/// Returns as soon as the bring-ups are spawned; use
	/// [`RestoreReport::settle_all`] to wait for their outcomes.
	pub async fn restore_all(&self) -> Result<RestoreReport> {
		let records = match self.inner.store.list().await {
			Ok(records) => records,
			Err(err) => match self.inner.restore_policy {
				RestorePolicy::FailFast => {
					error!(target = "sessiond.session", error = %err, "failed to list persisted sessions");
					return Err(err);
				}
				RestorePolicy::Degrade => {
					error!(target = "sessiond.session", error = %err, "failed to list persisted sessions; continuing with none restored");
					return Ok(RestoreReport::default());
				}
			},
		};

		info!(target = "sessiond.session", count = records.len(), "restoring persisted sessions");
		let mut report = RestoreReport::default();
		for record in records {
			let session_id = record.session_id;
			warn!(target = "sessiond.session", session_id = %session_id, "existing session detected; restoring");

			match self.bring_up(&session_id, Some(record.auth_blob), true).await {
				Ok(bring_up) => report.started.push(bring_up),
				Err(HubError::DuplicateSession(_)) => {
					debug!(target = "sessiond.session", session_id = %session_id, "session already live; restore skipped");
					report.skipped.push(session_id);
				}
				Err(err) => {
					warn!(target = "sessiond.session", session_id = %session_id, error = %err, "restore skipped");
					report.skipped.push(session_id);
				}
			}
		}
		Ok(report)
	}

	/// Starts a fresh session that has no persisted auth.
	pub async fn create_session(&self, session_id: &str) -> Result<BringUp> {
		self.bring_up(session_id, None, false).await
	}

	/// Starts one persisted session from its stored auth.
	pub async fn restore_session(&self, session_id: &str) -> Result<BringUp> {
		validate_session_id(session_id)?;
		let record = self.inner.store.get(session_id).await?;
		self.bring_up(session_id, Some(record.auth_blob), false).await
	}

	/// Stops a session and releases its client. The stored record is kept.
	pub async fn stop_session(&self, session_id: &str) -> Result<SessionSummary> {
		let handle = self
			.inner
			.registry
			.remove(session_id)
			.ok_or_else(|| HubError::NotFound(session_id.to_string()))?;
		let summary = handle.summary();
		release(handle).await;
		info!(target = "sessiond.session", session_id, "session stopped");
		Ok(summary)
	}

	/// Stops the session if it is registered and deletes its stored record.
	pub async fn delete_session(&self, session_id: &str) -> Result<()> {
		validate_session_id(session_id)?;
		let stopped = match self.inner.registry.remove(session_id) {
			Some(handle) => {
				release(handle).await;
				true
			}
			None => false,
		};

		match self.inner.store.delete(session_id).await {
			Ok(()) => {}
			Err(HubError::NotFound(_)) if stopped => {}
			Err(err) => return Err(err),
		}
		info!(target = "sessiond.session", session_id, stopped, "session deleted");
		Ok(())
	}

	pub fn session(&self, session_id: &str) -> Result<SessionSummary> {
		self.inner.registry.lookup(session_id)
	}

	pub fn sessions(&self) -> Vec<SessionSummary> {
		self.inner.registry.summaries()
	}

	pub fn list_active(&self) -> Vec<String> {
		self.inner.registry.list_active()
	}

	/// Stops every registered session.
	pub async fn shutdown(&self) {
		let handles = self.inner.registry.drain();
		if handles.is_empty() {
			return;
		}
		info!(target = "sessiond.session", count = handles.len(), "stopping all sessions");
		join_all(handles.into_iter().map(release)).await;
	}

	async fn bring_up(&self, session_id: &str, auth: Option<AuthBlob>, throttled: bool) -> Result<BringUp> {
		validate_session_id(session_id)?;
		let registration = self.inner.registry.register(session_id)?;
		if let Some(replaced) = registration.replaced {
			tokio::spawn(release(replaced));
		}

		let generation = registration.generation;
		let auth_present = auth.is_some();
		let task = tokio::spawn(run_session(Arc::clone(&self.inner), session_id.to_string(), generation, auth, throttled));
		if !self.inner.registry.attach_task(session_id, generation, task.abort_handle()) {
			task.abort();
		}

		debug!(target = "sessiond.session", session_id, generation, throttled, resumed = auth_present, "bring-up started");
		Ok(BringUp {
			session_id: session_id.to_string(),
			generation,
			status: registration.status,
			registry: Arc::clone(&self.inner.registry),
		})
	}
}

async fn release(mut handle: SessionHandle) {
	let (task, client) = handle.take_resources();
	if let Some(task) = task {
		task.abort();
	}
	if let Some(mut client) = client {
		if let Err(err) = client.shutdown().await {
			warn!(target = "sessiond.session", session_id = handle.session_id(), error = %err, "client shutdown failed");
		}
	}
}

async fn run_session(inner: Arc<ManagerInner>, session_id: String, generation: u64, auth: Option<AuthBlob>, throttled: bool) {
	let permit = match (&inner.restore_limit, throttled) {
		(Some(limit), true) => Arc::clone(limit).acquire_owned().await.ok(),
		_ => None,
	};

	let (startup, mut events) = match inner.factory.build(&session_id, auth).await {
		BuildOutcome::Started { startup, events } => (startup, events),
		BuildOutcome::Failed { reason } => {
			record_failure(&inner, &session_id, generation, reason);
			return;
		}
	};

	let startup = startup.wait();
	tokio::pin!(startup);
	let mut stream_open = true;
	let outcome = loop {
		tokio::select! {
			outcome = &mut startup => break outcome,
			event = events.recv(), if stream_open => match event {
				Some(event) => {
					inner.bridge.handle_event(&session_id, event).await;
				}
				None => stream_open = false,
			},
		}
	};
	drop(permit);

	// Events the client queued before startup resolved precede the outcome.
	let mut link = None;
	while let Ok(event) = events.try_recv() {
		if let Some(state) = inner.bridge.handle_event(&session_id, event).await {
			link = Some(state);
		}
	}

	match outcome {
		StartupResult::Ready(client) => {
			if let Err(mut client) = inner.registry.mark_ready(&session_id, generation, client) {
				debug!(target = "sessiond.session", session_id = %session_id, generation, "bring-up superseded; releasing client");
				if let Err(err) = client.shutdown().await {
					warn!(target = "sessiond.session", session_id = %session_id, error = %err, "client shutdown failed");
				}
				return;
			}
			info!(target = "sessiond.session", session_id = %session_id, "session ready");
			inner.bridge.publish(SessionEvent::new(&session_id, EventType::Ready, json!({})));
			if let Some(LinkState::Down(reason)) = link {
				if inner.registry.degrade(&session_id, generation, &reason) {
					warn!(target = "sessiond.session", session_id = %session_id, reason = %reason, "session lost its connection");
				}
			}
		}
		StartupResult::Failed { reason } => {
			record_failure(&inner, &session_id, generation, reason);
			return;
		}
	}

	while let Some(event) = events.recv().await {
		match inner.bridge.handle_event(&session_id, event).await {
			Some(LinkState::Down(reason)) => {
				if inner.registry.degrade(&session_id, generation, &reason) {
					warn!(target = "sessiond.session", session_id = %session_id, reason = %reason, "session lost its connection");
				}
			}
			Some(LinkState::Up) => {
				if inner.registry.recover(&session_id, generation) {
					info!(target = "sessiond.session", session_id = %session_id, "session recovered");
				}
			}
			None => {}
		}
	}

	if inner.registry.degrade(&session_id, generation, STREAM_CLOSED_REASON) {
		warn!(target = "sessiond.session", session_id = %session_id, "client event stream closed");
		inner
			.bridge
			.publish(SessionEvent::new(&session_id, EventType::Disconnected, json!({ "reason": STREAM_CLOSED_REASON })));
	}
}

fn record_failure(inner: &ManagerInner, session_id: &str, generation: u64, reason: String) {
	if !inner.registry.mark_failed(session_id, generation, &reason) {
		return;
	}
	warn!(target = "sessiond.session", session_id, reason = %reason, "session startup failed");
	inner
		.bridge
		.publish(SessionEvent::new(session_id, EventType::AuthFailure, json!({ "reason": reason })));
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use sessiond_runtime::ClientEvent;
	use sessiond_runtime::fake::{FakeConnector, FakeScript};

	use super::*;
	use crate::store::{MemoryStore, SessionRecord};

	fn manager(store: Arc<MemoryStore>, connector: &FakeConnector) -> SessionManager {
		SessionManager::new(
			store.clone(),
			ClientFactory::new(Arc::new(connector.clone())),
			EventBridge::new(store),
			ManagerOptions::default(),
		)
	}

	#[tokio::test]
	async fn create_then_duplicate_is_rejected() {
		let connector = FakeConnector::new();
		let manager = manager(Arc::new(MemoryStore::new()), &connector);

		let bring_up = manager.create_session("alice").await.unwrap();
		assert!(matches!(manager.create_session("alice").await, Err(HubError::DuplicateSession(_))));
		bring_up.ready().await.unwrap();

		assert_eq!(manager.list_active(), ["alice"]);
		assert_eq!(connector.connect_count("alice"), 1);
	}

	#[tokio::test]
	async fn invalid_ids_never_reach_the_registry() {
		let connector = FakeConnector::new();
		let manager = manager(Arc::new(MemoryStore::new()), &connector);

		assert!(matches!(manager.create_session("../etc").await, Err(HubError::InvalidSessionId(_))));
		assert!(manager.sessions().is_empty());
		assert_eq!(connector.total_connects(), 0);
	}

	#[tokio::test]
	async fn failed_session_can_be_retried() {
		let connector = FakeConnector::new();
		connector.script("bob", FakeScript::fail("bad credentials"));
		let manager = manager(Arc::new(MemoryStore::new()), &connector);

		let first = manager.create_session("bob").await.unwrap();
		let err = first.ready().await.unwrap_err();
		assert!(matches!(err, HubError::ClientStartup { ref reason, .. } if reason.contains("bad credentials")), "unexpected: {err}");
		assert_eq!(manager.session("bob").unwrap().status, SessionStatus::Failed);

		connector.script("bob", FakeScript::default());
		let second = manager.create_session("bob").await.unwrap();
		assert_eq!(second.settled().await, SessionStatus::Ready);
		assert!(second.generation() > first.generation());
	}

	#[tokio::test(start_paused = true)]
	async fn superseded_bring_up_shuts_its_client_down() {
		let connector = FakeConnector::new();
		connector.script("hank", FakeScript::ready_after(Duration::from_millis(100)));
		let manager = manager(Arc::new(MemoryStore::new()), &connector);

		manager.create_session("hank").await.unwrap();
		tokio::task::yield_now().await;
		assert!(manager.registry().remove("hank").is_some());

		tokio::time::sleep(Duration::from_millis(200)).await;
		assert_eq!(connector.connect_count("hank"), 1);
		assert_eq!(connector.shutdown_calls(), 1);
		assert_eq!(connector.live_clients(), 0);
		assert!(matches!(manager.session("hank"), Err(HubError::NotFound(_))));
	}

	#[tokio::test]
	async fn restore_session_resumes_stored_auth() {
		let store = Arc::new(MemoryStore::with_records([SessionRecord::new("carol", AuthBlob::from("saved"), 1)]));
		let connector = FakeConnector::new();
		let manager = manager(store, &connector);

		manager.restore_session("carol").await.unwrap().ready().await.unwrap();
		let options = connector.last_options("carol").unwrap();
		assert_eq!(options.auth.blob(), Some(&AuthBlob::from("saved")));

		assert!(matches!(manager.restore_session("dave").await, Err(HubError::NotFound(_))));
	}

	#[tokio::test]
	async fn disconnect_after_ready_marks_failed_until_ready_again() {
		let connector = FakeConnector::new();
		let manager = manager(Arc::new(MemoryStore::new()), &connector);
		manager.create_session("erin").await.unwrap().ready().await.unwrap();

		assert!(connector.emit("erin", ClientEvent::Disconnected("network".into())));
		tokio::time::sleep(Duration::from_millis(20)).await;
		let summary = manager.session("erin").unwrap();
		assert_eq!(summary.status, SessionStatus::Failed);
		assert_eq!(summary.error.as_deref(), Some("network"));

		assert!(connector.emit("erin", ClientEvent::Ready));
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(manager.session("erin").unwrap().status, SessionStatus::Ready);
	}

	#[tokio::test]
	async fn delete_removes_record_and_stops_session() {
		let store = Arc::new(MemoryStore::with_records([SessionRecord::new("frank", AuthBlob::from("x"), 1)]));
		let connector = FakeConnector::new();
		let manager = manager(store.clone(), &connector);
		manager.restore_session("frank").await.unwrap().ready().await.unwrap();

		manager.delete_session("frank").await.unwrap();
		assert!(store.is_empty());
		assert!(matches!(manager.session("frank"), Err(HubError::NotFound(_))));
		assert_eq!(connector.live_clients(), 0);
		assert!(matches!(manager.delete_session("frank").await, Err(HubError::NotFound(_))));
	}
}
