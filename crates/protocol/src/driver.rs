//! JSON-lines messages exchanged with a driver process.
//!
//! A driver hosts the concrete messaging client for exactly one session. The
//! host writes [`DriverCommand`]s to the driver's stdin and reads
//! [`DriverMessage`]s from its stdout, one JSON object per line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthBlob;

/// Host → driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DriverCommand {
	/// Start the client, resuming from `auth` when present.
	#[serde(rename_all = "camelCase")]
	Initialize {
		session_id: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		auth: Option<AuthBlob>,
		/// How often the driver should emit `backup` messages.
		backup_interval_ms: u64,
	},
	/// Release the client and exit.
	Shutdown,
}

/// Driver → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DriverMessage {
	Ready,
	Qr { code: String },
	AuthFailure { message: String },
	Disconnected { reason: String },
	Message { payload: Value },
	Backup { auth: AuthBlob },
}

/// Serializes `value` as a single newline-terminated JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
	let mut line = serde_json::to_string(value)?;
	line.push('\n');
	Ok(line)
}

/// Parses one JSON line (surrounding whitespace is ignored).
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> serde_json::Result<T> {
	serde_json::from_str(line.trim())
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn initialize_omits_auth_for_fresh_sessions() {
		let line = encode_line(&DriverCommand::Initialize {
			session_id: "carol".into(),
			auth: None,
			backup_interval_ms: 300_000,
		})
		.unwrap();
		assert!(line.ends_with('\n'));
		let value: Value = serde_json::from_str(&line).unwrap();
		assert_eq!(value, json!({ "type": "initialize", "sessionId": "carol", "backupIntervalMs": 300000 }));
	}

	#[test]
	fn backup_message_decodes_blob() {
		let message: DriverMessage = decode_line("{\"type\":\"backup\",\"auth\":\"AAEC\"}\r\n").unwrap();
		assert_eq!(message, DriverMessage::Backup { auth: AuthBlob::new(vec![0, 1, 2]) });
	}

	#[test]
	fn auth_failure_uses_camel_case_tag() {
		let message: DriverMessage = decode_line(r#"{"type":"authFailure","message":"logged out"}"#).unwrap();
		assert_eq!(message, DriverMessage::AuthFailure { message: "logged out".into() });
	}
}
