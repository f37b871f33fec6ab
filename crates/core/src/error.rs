use thiserror::Error;

/// Errors surfaced by the session core.
///
/// Variants are domain conditions: callers (an HTTP layer, the boot sequence)
/// decide how each maps onto their own wire format or exit policy.
#[derive(Debug, Error)]
pub enum HubError {
	/// The backing store could not be reached or read.
	#[error("Session store unavailable: {0}")]
	StoreUnavailable(String),

	/// Persisting a record failed.
	#[error("Failed to persist session {session_id}: {message}")]
	StoreWrite { session_id: String, message: String },

	#[error("Session not found: {0}")]
	NotFound(String),

	/// A live handle already exists for this id.
	#[error("Session {0} is already running")]
	DuplicateSession(String),

	#[error("Client startup failed for session {session_id}: {reason}")]
	ClientStartup { session_id: String, reason: String },

	#[error("Invalid session id {0:?}: expected 1-64 characters from [A-Za-z0-9_-]")]
	InvalidSessionId(String),

	#[error("Event delivery to {sink} failed: {message}")]
	Delivery { sink: String, message: String },

	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
