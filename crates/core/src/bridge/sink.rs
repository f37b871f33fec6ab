//! Notification sinks.

use async_trait::async_trait;
use sessiond_protocol::{EventType, SessionEvent};
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::Result;

pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// An external destination for forwarded session events.
///
/// Deliveries to one sink happen one at a time in publish order. A failed
/// delivery is logged by the bridge and dropped.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
	/// Short name used in logs.
	fn name(&self) -> &str;

	/// Whether events of `event_type` should be delivered to this sink.
	fn accepts(&self, _event_type: EventType) -> bool {
		true
	}

	async fn deliver(&self, event: &SessionEvent) -> Result<()>;
}

/// In-process fan-out to any number of subscribers (e.g. WebSocket clients).
///
/// Subscribers that fall more than the channel capacity behind lose the
/// oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
	tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastSink {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.tx.subscribe()
	}

	pub fn subscriber_count(&self) -> usize {
		self.tx.receiver_count()
	}
}

impl Default for BroadcastSink {
	fn default() -> Self {
		Self::new(DEFAULT_BROADCAST_CAPACITY)
	}
}

#[async_trait]
impl EventSink for BroadcastSink {
	fn name(&self) -> &str {
		"websocket"
	}

	async fn deliver(&self, event: &SessionEvent) -> Result<()> {
		// No subscribers is not a failure: nobody is listening right now.
		let receivers = self.tx.send(event.clone()).unwrap_or(0);
		trace!(target = "sessiond.bridge", session_id = %event.session_id, receivers, "event broadcast");
		Ok(())
	}
}
