//! Session store adapter.
//!
//! Uniform CRUD over persisted session auth blobs keyed by session id. The
//! core only depends on [`SessionStore`]; [`MemoryStore`] and [`FileStore`]
//! are the bundled backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sessiond_protocol::AuthBlob;

use crate::error::Result;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persisted auth state for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
	pub session_id: String,
	pub auth_blob: AuthBlob,
	/// Unix milliseconds of the first save.
	pub created_at: u64,
	/// Unix milliseconds of the latest save.
	pub updated_at: u64,
}

impl SessionRecord {
	pub fn new(session_id: impl Into<String>, auth_blob: AuthBlob, now: u64) -> Self {
		Self {
			session_id: session_id.into(),
			auth_blob,
			created_at: now,
			updated_at: now,
		}
	}

	/// Applies an upsert to an existing record.
	///
	/// `updated_at` always advances, even when two saves land in the same millisecond.
	pub fn apply_save(&mut self, auth_blob: AuthBlob, now: u64) {
		self.auth_blob = auth_blob;
		self.updated_at = now.max(self.updated_at + 1);
	}
}

/// Key-value document capability addressed by session id.
///
/// Every operation except `list` is idempotent under retry. `list` is a
/// point-in-time snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
	/// All persisted records. Fails with `StoreUnavailable` when the store cannot be read.
	async fn list(&self) -> Result<Vec<SessionRecord>>;

	/// The record for `session_id`, or `NotFound`.
	async fn get(&self, session_id: &str) -> Result<SessionRecord>;

	/// Creates or overwrites the auth blob for `session_id`. Fails with `StoreWrite`.
	async fn save(&self, session_id: &str, auth_blob: AuthBlob) -> Result<()>;

	/// Removes the record for `session_id`, or `NotFound`.
	async fn delete(&self, session_id: &str) -> Result<()>;
}
