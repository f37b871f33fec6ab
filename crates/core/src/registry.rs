//! In-memory registry of session handles.
//!
//! The registry is the single source of truth for what is running now. Its
//! `register` call checks for a live handle and inserts the new one under one
//! lock, which is what guarantees at most one live client per session id.
//!
//! Every handle carries a generation number. Bring-up tasks quote the
//! generation they were started with, so a task that outlived a stop (or a
//! replacement) can never touch the newer handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sessiond_protocol::{SessionStatus, SessionSummary, unix_millis};
use sessiond_runtime::MessagingClient;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::{HubError, Result};

/// The registry's exclusive record of one session.
pub struct SessionHandle {
	session_id: String,
	generation: u64,
	status: SessionStatus,
	error: Option<String>,
	updated_at: u64,
	client: Option<Box<dyn MessagingClient>>,
	task: Option<AbortHandle>,
	status_tx: watch::Sender<SessionStatus>,
}

impl SessionHandle {
	fn new(session_id: &str, generation: u64) -> Self {
		let (status_tx, _) = watch::channel(SessionStatus::Initializing);
		Self {
			session_id: session_id.to_string(),
			generation,
			status: SessionStatus::Initializing,
			error: None,
			updated_at: unix_millis(),
			client: None,
			task: None,
			status_tx,
		}
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn status(&self) -> SessionStatus {
		self.status
	}

	pub fn summary(&self) -> SessionSummary {
		SessionSummary {
			session_id: self.session_id.clone(),
			status: self.status,
			error: self.error.clone(),
			updated_at: self.updated_at,
		}
	}

	/// Takes the session task's abort handle and the installed client, leaving
	/// the handle inert.
	pub(crate) fn take_resources(&mut self) -> (Option<AbortHandle>, Option<Box<dyn MessagingClient>>) {
		(self.task.take(), self.client.take())
	}

	fn transition(&mut self, status: SessionStatus, error: Option<String>) {
		self.status = status;
		self.error = error;
		self.updated_at = unix_millis();
		self.status_tx.send_replace(status);
	}
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("session_id", &self.session_id)
			.field("generation", &self.generation)
			.field("status", &self.status)
			.field("error", &self.error)
			.field("has_client", &self.client.is_some())
			.finish()
	}
}

/// Result of a successful `register`.
#[derive(Debug)]
pub struct Registration {
	pub generation: u64,
	pub status: watch::Receiver<SessionStatus>,
	/// A failed or stopped handle displaced by this registration. Its
	/// resources still need releasing.
	pub replaced: Option<SessionHandle>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
	handles: Mutex<HashMap<String, SessionHandle>>,
	next_generation: AtomicU64,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts an `Initializing` handle for `session_id`.
	///
	/// Fails with `DuplicateSession` while a live handle exists.
	pub fn register(&self, session_id: &str) -> Result<Registration> {
		let mut handles = self.handles.lock();
		if handles.get(session_id).is_some_and(|h| h.status.is_live()) {
			return Err(HubError::DuplicateSession(session_id.to_string()));
		}

		let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
		let handle = SessionHandle::new(session_id, generation);
		let status = handle.status_tx.subscribe();
		let replaced = handles.insert(session_id.to_string(), handle);

		debug!(target = "sessiond.registry", session_id, generation, replaced = replaced.is_some(), "session registered");
		Ok(Registration { generation, status, replaced })
	}

	pub fn lookup(&self, session_id: &str) -> Result<SessionSummary> {
		self.handles
			.lock()
			.get(session_id)
			.map(SessionHandle::summary)
			.ok_or_else(|| HubError::NotFound(session_id.to_string()))
	}

	/// Removes the handle regardless of status and marks it `Stopped`.
	pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
		let mut handle = self.handles.lock().remove(session_id)?;
		handle.transition(SessionStatus::Stopped, None);
		debug!(target = "sessiond.registry", session_id, generation = handle.generation, "session removed");
		Some(handle)
	}

	/// Removes every handle, marking each `Stopped`.
	pub fn drain(&self) -> Vec<SessionHandle> {
		let mut handles: Vec<_> = self.handles.lock().drain().map(|(_, h)| h).collect();
		for handle in &mut handles {
			handle.transition(SessionStatus::Stopped, None);
		}
		handles
	}

	/// Ids of live (initializing or ready) sessions, sorted.
	pub fn list_active(&self) -> Vec<String> {
		let mut ids: Vec<_> = self
			.handles
			.lock()
			.values()
			.filter(|h| h.status.is_live())
			.map(|h| h.session_id.clone())
			.collect();
		ids.sort();
		ids
	}

	/// Summaries of every registered handle, sorted by id.
	pub fn summaries(&self) -> Vec<SessionSummary> {
		let mut summaries: Vec<_> = self.handles.lock().values().map(SessionHandle::summary).collect();
		summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
		summaries
	}

	pub fn subscribe(&self, session_id: &str) -> Option<watch::Receiver<SessionStatus>> {
		self.handles.lock().get(session_id).map(|h| h.status_tx.subscribe())
	}

	pub fn len(&self) -> usize {
		self.handles.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.lock().is_empty()
	}

	/// Records the task driving `generation`. Returns `false` when that
	/// generation is no longer registered, in which case the caller aborts it.
	pub fn attach_task(&self, session_id: &str, generation: u64, task: AbortHandle) -> bool {
		self.with_current(session_id, generation, |handle| {
			handle.task = Some(task);
			true
		})
		.unwrap_or(false)
	}

	/// `Initializing → Ready`, installing `client`.
	///
	/// Hands the client back when the generation is stale so the caller can
	/// release it.
	pub fn mark_ready(&self, session_id: &str, generation: u64, client: Box<dyn MessagingClient>) -> std::result::Result<(), Box<dyn MessagingClient>> {
		let mut handles = self.handles.lock();
		match handles.get_mut(session_id) {
			Some(handle) if handle.generation == generation && handle.status == SessionStatus::Initializing => {
				handle.client = Some(client);
				handle.transition(SessionStatus::Ready, None);
				Ok(())
			}
			_ => Err(client),
		}
	}

	/// `Initializing → Failed`.
	pub fn mark_failed(&self, session_id: &str, generation: u64, reason: &str) -> bool {
		self.with_current(session_id, generation, |handle| {
			if handle.status != SessionStatus::Initializing {
				return false;
			}
			handle.transition(SessionStatus::Failed, Some(reason.to_string()));
			true
		})
		.unwrap_or(false)
	}

	/// `Ready → Failed` after the client reported it lost its connection or auth.
	pub fn degrade(&self, session_id: &str, generation: u64, reason: &str) -> bool {
		self.with_current(session_id, generation, |handle| {
			if handle.status != SessionStatus::Ready {
				return false;
			}
			handle.transition(SessionStatus::Failed, Some(reason.to_string()));
			true
		})
		.unwrap_or(false)
	}

	/// `Failed → Ready` when the installed client reports it is ready again.
	pub fn recover(&self, session_id: &str, generation: u64) -> bool {
		self.with_current(session_id, generation, |handle| {
			if handle.status != SessionStatus::Failed || handle.client.is_none() {
				return false;
			}
			handle.transition(SessionStatus::Ready, None);
			true
		})
		.unwrap_or(false)
	}

	fn with_current<T>(&self, session_id: &str, generation: u64, f: impl FnOnce(&mut SessionHandle) -> T) -> Option<T> {
		let mut handles = self.handles.lock();
		handles.get_mut(session_id).filter(|h| h.generation == generation).map(f)
	}
}
