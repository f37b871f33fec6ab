use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use sessiond_protocol::{AuthBlob, unix_millis};

use super::{SessionRecord, SessionStore};
use crate::error::{HubError, Result};

/// Process-local store. Records live as long as the store value.
#[derive(Debug, Default)]
pub struct MemoryStore {
	records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store pre-populated with `records`.
	pub fn with_records(records: impl IntoIterator<Item = SessionRecord>) -> Self {
		let records = records.into_iter().map(|r| (r.session_id.clone(), r)).collect();
		Self {
			records: RwLock::new(records),
		}
	}

	pub fn len(&self) -> usize {
		self.records.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.read().is_empty()
	}
}

#[async_trait]
impl SessionStore for MemoryStore {
	async fn list(&self) -> Result<Vec<SessionRecord>> {
		let mut records: Vec<_> = self.records.read().values().cloned().collect();
		records.sort_by(|a, b| a.session_id.cmp(&b.session_id));
		Ok(records)
	}

	async fn get(&self, session_id: &str) -> Result<SessionRecord> {
		self.records
			.read()
			.get(session_id)
			.cloned()
			.ok_or_else(|| HubError::NotFound(session_id.to_string()))
	}

	async fn save(&self, session_id: &str, auth_blob: AuthBlob) -> Result<()> {
		let now = unix_millis();
		let mut records = self.records.write();
		match records.get_mut(session_id) {
			Some(record) => record.apply_save(auth_blob, now),
			None => {
				records.insert(session_id.to_string(), SessionRecord::new(session_id, auth_blob, now));
			}
		}
		Ok(())
	}

	async fn delete(&self, session_id: &str) -> Result<()> {
		self.records
			.write()
			.remove(session_id)
			.map(|_| ())
			.ok_or_else(|| HubError::NotFound(session_id.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn save_then_get_returns_blob() {
		let store = MemoryStore::new();
		store.save("alice", AuthBlob::from("v1")).await.unwrap();

		let record = store.get("alice").await.unwrap();
		assert_eq!(record.auth_blob, AuthBlob::from("v1"));
		assert_eq!(record.created_at, record.updated_at);
	}

	#[tokio::test]
	async fn second_save_overwrites_blob_and_advances_updated_at() {
		let store = MemoryStore::new();
		store.save("alice", AuthBlob::from("v1")).await.unwrap();
		let first = store.get("alice").await.unwrap();

		store.save("alice", AuthBlob::from("v2")).await.unwrap();
		let second = store.get("alice").await.unwrap();

		assert_eq!(second.auth_blob, AuthBlob::from("v2"));
		assert_eq!(second.created_at, first.created_at);
		assert!(second.updated_at > first.updated_at);
	}

	#[tokio::test]
	async fn delete_is_not_found_the_second_time() {
		let store = MemoryStore::with_records([SessionRecord::new("bob", AuthBlob::from("x"), 1)]);
		store.delete("bob").await.unwrap();
		assert!(matches!(store.delete("bob").await, Err(HubError::NotFound(_))));
		assert!(matches!(store.get("bob").await, Err(HubError::NotFound(_))));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn list_is_sorted_by_session_id() {
		let store = MemoryStore::with_records([
			SessionRecord::new("carol", AuthBlob::from("c"), 1),
			SessionRecord::new("alice", AuthBlob::from("a"), 1),
		]);
		let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|r| r.session_id).collect();
		assert_eq!(ids, ["alice", "carol"]);
	}
}
