//! Event bridge: persistence of auth backups and fan-out to sinks.
//!
//! Each registered sink gets its own dispatcher task fed by an unbounded
//! channel. Publishing never waits on a sink, so a slow webhook cannot hold up
//! a session's event pump or other sessions. Ordering is preserved per sink.

use std::sync::Arc;

use serde_json::json;
use sessiond_protocol::{EventType, SessionEvent};
use sessiond_runtime::ClientEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::store::SessionStore;

mod sink;
mod webhook;

pub use sink::{BroadcastSink, DEFAULT_BROADCAST_CAPACITY, EventSink};
pub use webhook::WebhookSink;

/// Connectivity change reported by a client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
	Up,
	Down(String),
}

struct SinkSlot {
	sink: Arc<dyn EventSink>,
	tx: mpsc::UnboundedSender<SessionEvent>,
}

pub struct EventBridge {
	store: Arc<dyn SessionStore>,
	sinks: Vec<SinkSlot>,
}

impl EventBridge {
	pub fn new(store: Arc<dyn SessionStore>) -> Self {
		Self { store, sinks: Vec::new() }
	}

	/// Adds a sink and spawns its dispatcher. Must be called inside a tokio runtime.
	pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(dispatch(Arc::clone(&sink), rx));
		self.sinks.push(SinkSlot { sink, tx });
		self
	}

	pub fn sink_count(&self) -> usize {
		self.sinks.len()
	}

	/// Queues `event` for every sink that accepts its type.
	pub fn publish(&self, event: SessionEvent) {
		for slot in &self.sinks {
			if !slot.sink.accepts(event.event_type) {
				continue;
			}
			if slot.tx.send(event.clone()).is_err() {
				warn!(target = "sessiond.bridge", sink = slot.sink.name(), "sink dispatcher gone; event dropped");
			}
		}
	}

	/// Handles one client event for `session_id`.
	///
	/// Auth backups are written to the store before this returns; everything
	/// else is published. Returns the connectivity change the event implies.
	pub async fn handle_event(&self, session_id: &str, event: ClientEvent) -> Option<LinkState> {
		match event {
			ClientEvent::AuthBackup(blob) => {
				let bytes = blob.len();
				match self.store.save(session_id, blob).await {
					Ok(()) => debug!(target = "sessiond.bridge", session_id, bytes, "auth backup persisted"),
					Err(err) => warn!(target = "sessiond.bridge", session_id, error = %err, "failed to persist auth backup"),
				}
				None
			}
			ClientEvent::Ready => {
				self.publish(SessionEvent::new(session_id, EventType::Ready, json!({})));
				Some(LinkState::Up)
			}
			ClientEvent::Qr(code) => {
				self.publish(SessionEvent::new(session_id, EventType::Qr, json!({ "qr": code })));
				None
			}
			ClientEvent::AuthFailure(reason) => {
				self.publish(SessionEvent::new(session_id, EventType::AuthFailure, json!({ "reason": reason })));
				Some(LinkState::Down(reason))
			}
			ClientEvent::Disconnected(reason) => {
				self.publish(SessionEvent::new(session_id, EventType::Disconnected, json!({ "reason": reason })));
				Some(LinkState::Down(reason))
			}
			ClientEvent::Message(payload) => {
				self.publish(SessionEvent::new(session_id, EventType::Message, payload));
				None
			}
		}
	}
}

async fn dispatch(sink: Arc<dyn EventSink>, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
	while let Some(event) = rx.recv().await {
		if let Err(err) = sink.deliver(&event).await {
			warn!(
				target = "sessiond.bridge",
				sink = sink.name(),
				session_id = %event.session_id,
				event_type = %event.event_type,
				error = %err,
				"event delivery failed"
			);
		}
	}
	debug!(target = "sessiond.bridge", sink = sink.name(), "sink dispatcher stopped");
}
