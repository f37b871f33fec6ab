//! Normalized event payload delivered to notification sinks.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a forwarded session event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
	/// The client finished startup and is connected.
	Ready,
	/// The client needs the end user to complete a fresh login.
	Qr,
	/// Startup failed, or the service revoked the session's auth.
	AuthFailure,
	/// The connection to the service was lost.
	Disconnected,
	/// An inbound message for the session.
	Message,
}

impl EventType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ready => "ready",
			Self::Qr => "qr",
			Self::AuthFailure => "authFailure",
			Self::Disconnected => "disconnected",
			Self::Message => "message",
		}
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Event envelope forwarded to webhooks and WebSocket subscribers.
///
/// ```json
/// {
///   "sessionId": "alice",
///   "eventType": "ready",
///   "timestamp": 1718000000000,
///   "data": {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
	pub session_id: String,
	pub event_type: EventType,
	/// Unix milliseconds at which the event was observed.
	pub timestamp: u64,
	pub data: Value,
}

impl SessionEvent {
	/// Creates an event stamped with the current time.
	pub fn new(session_id: impl Into<String>, event_type: EventType, data: Value) -> Self {
		Self {
			session_id: session_id.into(),
			event_type,
			timestamp: unix_millis(),
			data,
		}
	}
}

/// Current wall-clock time as unix milliseconds.
pub fn unix_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
