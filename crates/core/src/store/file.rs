//! One JSON document per session under a directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sessiond_protocol::{AuthBlob, unix_millis};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{SessionRecord, SessionStore};
use crate::error::{HubError, Result};
use crate::session_id::validate_session_id;

const RECORD_EXTENSION: &str = "json";

/// Directory-backed store: `<dir>/<session_id>.json`.
///
/// Writes go through a temp file and a rename, so a crash mid-save leaves
/// either the previous record or the new one.
#[derive(Debug)]
pub struct FileStore {
	dir: PathBuf,
	write_lock: Mutex<()>,
}

impl FileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			write_lock: Mutex::new(()),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn record_path(&self, session_id: &str) -> Result<PathBuf> {
		validate_session_id(session_id)?;
		Ok(self.dir.join(format!("{session_id}.{RECORD_EXTENSION}")))
	}

	/// Reads the record at `path`. A document whose `sessionId` differs from
	/// `session_id` is `InvalidData`, like a corrupt one.
	async fn read_record(path: &Path, session_id: &str) -> std::io::Result<Option<SessionRecord>> {
		let content = match tokio::fs::read_to_string(path).await {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(err),
		};
		let record: SessionRecord = serde_json::from_str(&content).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
		if record.session_id != session_id {
			return Err(std::io::Error::new(
				ErrorKind::InvalidData,
				format!("record names session {:?}, file names {session_id:?}", record.session_id),
			));
		}
		Ok(Some(record))
	}

	async fn write_record(&self, path: &Path, record: &SessionRecord) -> std::io::Result<()> {
		tokio::fs::create_dir_all(&self.dir).await?;
		let json = serde_json::to_vec_pretty(record).map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
		let tmp = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, path).await
	}
}

#[async_trait]
impl SessionStore for FileStore {
	async fn list(&self) -> Result<Vec<SessionRecord>> {
		let mut entries = match tokio::fs::read_dir(&self.dir).await {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => {
				debug!(target = "sessiond.store", dir = %self.dir.display(), "store directory missing; no sessions");
				return Ok(Vec::new());
			}
			Err(err) => return Err(HubError::StoreUnavailable(format!("{}: {}", self.dir.display(), err))),
		};

		let mut records = Vec::new();
		loop {
			let entry = match entries.next_entry().await {
				Ok(Some(entry)) => entry,
				Ok(None) => break,
				Err(err) => return Err(HubError::StoreUnavailable(format!("{}: {}", self.dir.display(), err))),
			};

			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
				continue;
			}
			let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};

			match Self::read_record(&path, session_id).await {
				Ok(Some(record)) => records.push(record),
				Ok(None) => {}
				Err(err) if err.kind() == ErrorKind::InvalidData => {
					warn!(target = "sessiond.store", path = %path.display(), error = %err, "skipping unreadable session record");
				}
				Err(err) => return Err(HubError::StoreUnavailable(format!("{}: {}", path.display(), err))),
			}
		}

		records.sort_by(|a, b| a.session_id.cmp(&b.session_id));
		Ok(records)
	}

	async fn get(&self, session_id: &str) -> Result<SessionRecord> {
		let path = self.record_path(session_id)?;
		match Self::read_record(&path, session_id).await {
			Ok(Some(record)) => Ok(record),
			Ok(None) => Err(HubError::NotFound(session_id.to_string())),
			Err(err) => Err(HubError::StoreUnavailable(format!("{}: {}", path.display(), err))),
		}
	}

	async fn save(&self, session_id: &str, auth_blob: AuthBlob) -> Result<()> {
		let path = self.record_path(session_id)?;
		let write_error = |err: std::io::Error| HubError::StoreWrite {
			session_id: session_id.to_string(),
			message: err.to_string(),
		};

		let _guard = self.write_lock.lock().await;
		let now = unix_millis();
		let record = match Self::read_record(&path, session_id).await {
			Ok(Some(mut record)) => {
				record.apply_save(auth_blob, now);
				record
			}
			Ok(None) => SessionRecord::new(session_id, auth_blob, now),
			Err(err) if err.kind() == ErrorKind::InvalidData => {
				warn!(target = "sessiond.store", path = %path.display(), error = %err, "overwriting unreadable session record");
				SessionRecord::new(session_id, auth_blob, now)
			}
			Err(err) => return Err(write_error(err)),
		};

		self.write_record(&path, &record).await.map_err(write_error)?;
		debug!(target = "sessiond.store", session_id, bytes = record.auth_blob.len(), "session record saved");
		Ok(())
	}

	async fn delete(&self, session_id: &str) -> Result<()> {
		let path = self.record_path(session_id)?;
		let _guard = self.write_lock.lock().await;
		match tokio::fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::NotFound => Err(HubError::NotFound(session_id.to_string())),
			Err(err) => Err(HubError::StoreWrite {
				session_id: session_id.to_string(),
				message: err.to_string(),
			}),
		}
	}
}
