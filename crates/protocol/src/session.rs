//! Session status values reported to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
	Initializing,
	Ready,
	Failed,
	Stopped,
}

impl SessionStatus {
	/// Returns `true` while the session owns (or is acquiring) a client.
	pub fn is_live(self) -> bool {
		matches!(self, Self::Initializing | Self::Ready)
	}

	/// Returns `true` once bring-up has reached a terminal outcome.
	pub fn is_settled(self) -> bool {
		!matches!(self, Self::Initializing)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Initializing => "initializing",
			Self::Ready => "ready",
			Self::Failed => "failed",
			Self::Stopped => "stopped",
		}
	}
}

impl fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub session_id: String,
	pub status: SessionStatus,
	/// Failure reason, present when `status` is `failed`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// Unix milliseconds of the last status change.
	pub updated_at: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_initializing_and_ready_are_live() {
		assert!(SessionStatus::Initializing.is_live());
		assert!(SessionStatus::Ready.is_live());
		assert!(!SessionStatus::Failed.is_live());
		assert!(!SessionStatus::Stopped.is_live());
	}

	#[test]
	fn summary_omits_missing_error() {
		let summary = SessionSummary {
			session_id: "alice".into(),
			status: SessionStatus::Ready,
			error: None,
			updated_at: 7,
		};
		let value = serde_json::to_value(&summary).unwrap();
		assert_eq!(value, serde_json::json!({ "sessionId": "alice", "status": "ready", "updatedAt": 7 }));
	}
}
