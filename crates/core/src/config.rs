//! Runtime configuration consumed by the session core.
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! Callers layer their own overrides (CLI flags, environment) on top of a
//! loaded [`HubConfig`] and call [`HubConfig::validate`] before use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessiond_protocol::EventType;

use crate::error::{HubError, Result};

pub const DEFAULT_BACKUP_INTERVAL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_STORE_DIR: &str = ".sessiond/sessions";

/// What `restore_all` does when the store cannot be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestorePolicy {
	/// Report the failure to the caller (boot aborts).
	#[default]
	FailFast,
	/// Log the failure and continue with zero restored sessions.
	Degrade,
}

/// Backing store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreConfig {
	/// One JSON document per session under `dir`.
	File { dir: PathBuf },
	/// Process-local map; nothing survives a restart.
	Memory,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self::File {
			dir: PathBuf::from(DEFAULT_STORE_DIR),
		}
	}
}

/// External driver process hosting the messaging client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
	pub program: PathBuf,
	#[serde(default)]
	pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubConfig {
	/// How often clients re-emit auth state for persistence.
	pub backup_interval_ms: u64,
	/// Upper bound on a single client startup.
	pub startup_timeout_ms: u64,
	/// Throttle for concurrent bring-ups during `restore_all` (unbounded when unset).
	pub max_concurrent_restores: Option<usize>,
	pub webhook_url: Option<String>,
	/// Event types posted to the webhook (all when unset).
	pub webhook_events: Option<Vec<EventType>>,
	pub webhook_timeout_ms: u64,
	pub enable_websocket: bool,
	pub restore_policy: RestorePolicy,
	pub store: StoreConfig,
	pub listen: String,
	pub driver: Option<DriverConfig>,
}

impl Default for HubConfig {
	fn default() -> Self {
		Self {
			backup_interval_ms: DEFAULT_BACKUP_INTERVAL_MS,
			startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
			max_concurrent_restores: None,
			webhook_url: None,
			webhook_events: None,
			webhook_timeout_ms: DEFAULT_WEBHOOK_TIMEOUT_MS,
			enable_websocket: false,
			restore_policy: RestorePolicy::FailFast,
			store: StoreConfig::default(),
			listen: DEFAULT_LISTEN.to_string(),
			driver: None,
		}
	}
}

impl HubConfig {
	/// Loads a JSON config file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| HubError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
		Self::from_json(&content).map_err(|e| match e {
			HubError::Config(msg) => HubError::Config(format!("{}: {}", path.display(), msg)),
			other => other,
		})
	}

	pub fn from_json(content: &str) -> Result<Self> {
		serde_json::from_str(content).map_err(|e| HubError::Config(e.to_string()))
	}

	pub fn backup_interval(&self) -> Duration {
		Duration::from_millis(self.backup_interval_ms)
	}

	pub fn startup_timeout(&self) -> Duration {
		Duration::from_millis(self.startup_timeout_ms)
	}

	pub fn webhook_timeout(&self) -> Duration {
		Duration::from_millis(self.webhook_timeout_ms)
	}

	pub fn listen_addr(&self) -> Result<SocketAddr> {
		self.listen
			.parse()
			.map_err(|e| HubError::Config(format!("listen address {:?}: {}", self.listen, e)))
	}

	/// Rejects values the core cannot run with.
	pub fn validate(&self) -> Result<()> {
		if self.backup_interval_ms == 0 {
			return Err(HubError::Config("backupIntervalMs must be greater than zero".into()));
		}
		if self.startup_timeout_ms == 0 {
			return Err(HubError::Config("startupTimeoutMs must be greater than zero".into()));
		}
		if self.webhook_timeout_ms == 0 {
			return Err(HubError::Config("webhookTimeoutMs must be greater than zero".into()));
		}
		if self.max_concurrent_restores == Some(0) {
			return Err(HubError::Config("maxConcurrentRestores must be at least 1 when set".into()));
		}
		if let Some(url) = &self.webhook_url {
			let parsed = reqwest::Url::parse(url).map_err(|e| HubError::Config(format!("webhookUrl {url:?}: {e}")))?;
			if !matches!(parsed.scheme(), "http" | "https") {
				return Err(HubError::Config(format!("webhookUrl {url:?}: scheme must be http or https")));
			}
		}
		if let Some(driver) = &self.driver {
			if driver.program.as_os_str().is_empty() {
				return Err(HubError::Config("driver.program must not be empty".into()));
			}
		}
		self.listen_addr()?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let config = HubConfig::from_json("{}").unwrap();
		assert_eq!(config.backup_interval(), Duration::from_secs(300));
		assert_eq!(config.restore_policy, RestorePolicy::FailFast);
		assert_eq!(config.store, StoreConfig::default());
		assert!(config.max_concurrent_restores.is_none());
		assert!(!config.enable_websocket);
		config.validate().unwrap();
	}

	#[test]
	fn parses_camel_case_fields() {
		let config = HubConfig::from_json(
			r#"{
  "backupIntervalMs": 1000,
  "maxConcurrentRestores": 4,
  "webhookUrl": "https://hooks.example.com/sessions",
  "webhookEvents": ["ready", "authFailure"],
  "enableWebsocket": true,
  "restorePolicy": "degrade",
  "store": { "kind": "memory" },
  "driver": { "program": "/usr/bin/driver", "args": ["--headless"] }
}"#,
		)
		.unwrap();

		assert_eq!(config.backup_interval_ms, 1000);
		assert_eq!(config.max_concurrent_restores, Some(4));
		assert_eq!(config.webhook_events, Some(vec![EventType::Ready, EventType::AuthFailure]));
		assert!(config.enable_websocket);
		assert_eq!(config.restore_policy, RestorePolicy::Degrade);
		assert_eq!(config.store, StoreConfig::Memory);
		assert_eq!(config.driver.as_ref().map(|d| d.args.clone()), Some(vec!["--headless".to_string()]));
		config.validate().unwrap();
	}

	#[test]
	fn validate_rejects_zero_interval_and_bad_webhook() {
		let config = HubConfig {
			backup_interval_ms: 0,
			..HubConfig::default()
		};
		assert!(matches!(config.validate(), Err(HubError::Config(_))));

		let config = HubConfig {
			webhook_url: Some("ftp://example.com".into()),
			..HubConfig::default()
		};
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("scheme"));

		let config = HubConfig {
			max_concurrent_restores: Some(0),
			..HubConfig::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn load_reports_path_on_parse_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, "{ not json").unwrap();
		let err = HubConfig::load(&path).unwrap_err();
		assert!(err.to_string().contains("config.json"), "unexpected error: {err}");
	}
}
