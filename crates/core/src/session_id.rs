//! Session id validation.

use crate::error::{HubError, Result};

pub const MAX_SESSION_ID_LEN: usize = 64;

/// Accepts 1..=64 characters from `[A-Za-z0-9_-]`.
///
/// Ids end up as file names and URL path segments, so nothing else is allowed.
pub fn validate_session_id(session_id: &str) -> Result<()> {
	let valid = !session_id.is_empty()
		&& session_id.len() <= MAX_SESSION_ID_LEN
		&& session_id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

	if valid {
		Ok(())
	} else {
		Err(HubError::InvalidSessionId(session_id.to_string()))
	}
}
