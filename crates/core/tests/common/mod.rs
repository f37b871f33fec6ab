#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sessiond::{
	AuthBlob, ClientFactory, EventBridge, EventSink, EventType, HubError, ManagerOptions, MemoryStore, Result, SessionEvent, SessionManager,
	SessionRecord, SessionStore,
};
use sessiond_runtime::fake::FakeConnector;

/// Sink that remembers every delivered event.
#[derive(Default)]
pub struct RecordingSink {
	events: Mutex<Vec<SessionEvent>>,
}

impl RecordingSink {
	pub fn events(&self) -> Vec<SessionEvent> {
		self.events.lock().clone()
	}

	pub fn of(&self, session_id: &str, event_type: EventType) -> Vec<SessionEvent> {
		self.events
			.lock()
			.iter()
			.filter(|e| e.session_id == session_id && e.event_type == event_type)
			.cloned()
			.collect()
	}
}

#[async_trait]
impl EventSink for RecordingSink {
	fn name(&self) -> &str {
		"recording"
	}

	async fn deliver(&self, event: &SessionEvent) -> Result<()> {
		self.events.lock().push(event.clone());
		Ok(())
	}
}

/// Wraps a [`MemoryStore`], counting saves and optionally failing `list`.
#[derive(Default)]
pub struct ProbeStore {
	pub inner: MemoryStore,
	pub saves: AtomicUsize,
	pub list_fails: bool,
	pub save_fails: bool,
}

impl ProbeStore {
	pub fn with_records(records: impl IntoIterator<Item = SessionRecord>) -> Self {
		Self {
			inner: MemoryStore::with_records(records),
			..Self::default()
		}
	}

	pub fn unreachable() -> Self {
		Self {
			list_fails: true,
			..Self::default()
		}
	}

	pub fn read_only() -> Self {
		Self {
			save_fails: true,
			..Self::default()
		}
	}

	pub fn save_count(&self) -> usize {
		self.saves.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionStore for ProbeStore {
	async fn list(&self) -> Result<Vec<SessionRecord>> {
		if self.list_fails {
			return Err(HubError::StoreUnavailable("connection refused".into()));
		}
		self.inner.list().await
	}

	async fn get(&self, session_id: &str) -> Result<SessionRecord> {
		self.inner.get(session_id).await
	}

	async fn save(&self, session_id: &str, auth_blob: AuthBlob) -> Result<()> {
		self.saves.fetch_add(1, Ordering::SeqCst);
		if self.save_fails {
			return Err(HubError::StoreWrite {
				session_id: session_id.to_string(),
				message: "read-only file system".into(),
			});
		}
		self.inner.save(session_id, auth_blob).await
	}

	async fn delete(&self, session_id: &str) -> Result<()> {
		self.inner.delete(session_id).await
	}
}

pub struct Harness {
	pub manager: SessionManager,
	pub connector: FakeConnector,
	pub store: Arc<ProbeStore>,
	pub sink: Arc<RecordingSink>,
}

impl Harness {
	pub fn new(store: ProbeStore) -> Self {
		Self::with_options(store, ManagerOptions::default())
	}

	pub fn with_options(store: ProbeStore, options: ManagerOptions) -> Self {
		let store = Arc::new(store);
		let connector = FakeConnector::new();
		let sink = Arc::new(RecordingSink::default());
		let bridge = EventBridge::new(store.clone()).with_sink(sink.clone());
		let factory = ClientFactory::new(Arc::new(connector.clone()));
		let manager = SessionManager::new(store.clone(), factory, bridge, options);
		Self {
			manager,
			connector,
			store,
			sink,
		}
	}
}

pub fn record(session_id: &str) -> SessionRecord {
	SessionRecord::new(session_id, AuthBlob::from(format!("auth-{session_id}").as_str()), 1)
}

/// Lets spawned tasks and sink dispatchers run.
pub async fn settle() {
	for _ in 0..20 {
		tokio::task::yield_now().await;
	}
	tokio::time::sleep(Duration::from_millis(20)).await;
}
