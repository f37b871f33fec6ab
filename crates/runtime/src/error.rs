use thiserror::Error;

/// Errors raised by a messaging-client capability.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("Failed to spawn driver {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Client startup failed: {0}")]
	Startup(String),

	#[error("Driver protocol error: {0}")]
	Protocol(String),

	#[error("Driver I/O error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
