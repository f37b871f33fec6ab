//! Wires store, connector, sinks and manager from a [`HubConfig`].

use std::sync::Arc;

use anyhow::{Result, bail};
use sessiond::{
	BroadcastSink, ClientFactory, EventBridge, FileStore, HubConfig, ManagerOptions, MemoryStore, SessionManager, SessionStore, StoreConfig,
	WebhookSink,
};
use sessiond_runtime::ClientConnector;
use sessiond_runtime::driver::DriverConnector;
use tracing::info;

/// Everything the HTTP surface needs.
#[derive(Clone)]
pub struct App {
	pub manager: SessionManager,
	/// Present when the WebSocket event stream is enabled.
	pub broadcast: Option<BroadcastSink>,
}

impl App {
	/// Builds the app with the driver connector named in `config`.
	pub fn from_config(config: &HubConfig) -> Result<Self> {
		let Some(driver) = &config.driver else {
			bail!("no driver configured: pass --driver <PROGRAM> or set \"driver\" in the config file");
		};
		let connector = DriverConnector::new(&driver.program, driver.args.clone());
		Self::with_connector(config, Arc::new(connector))
	}

	/// Builds the app around an arbitrary connector. Must run inside a tokio runtime.
	pub fn with_connector(config: &HubConfig, connector: Arc<dyn ClientConnector>) -> Result<Self> {
		let store: Arc<dyn SessionStore> = match &config.store {
			StoreConfig::File { dir } => {
				info!(target = "sessiond", dir = %dir.display(), "using file session store");
				Arc::new(FileStore::new(dir))
			}
			StoreConfig::Memory => {
				info!(target = "sessiond", "using in-memory session store; sessions will not survive a restart");
				Arc::new(MemoryStore::new())
			}
		};

		let mut bridge = EventBridge::new(Arc::clone(&store));
		if let Some(url) = &config.webhook_url {
			let mut webhook = WebhookSink::new(url, config.webhook_timeout())?;
			if let Some(events) = &config.webhook_events {
				webhook = webhook.with_events(events.iter().copied());
			}
			info!(target = "sessiond", url = %url, "webhook sink enabled");
			bridge = bridge.with_sink(Arc::new(webhook));
		}

		let broadcast = config.enable_websocket.then(BroadcastSink::default);
		if let Some(sink) = &broadcast {
			bridge = bridge.with_sink(Arc::new(sink.clone()));
		}

		let factory = ClientFactory::new(connector)
			.with_backup_interval(config.backup_interval())
			.with_startup_timeout(config.startup_timeout());
		let manager = SessionManager::new(store, factory, bridge, ManagerOptions::from(config));

		Ok(Self { manager, broadcast })
	}
}

#[cfg(test)]
mod tests {
	use sessiond_runtime::fake::FakeConnector;

	use super::*;

	#[test]
	fn missing_driver_is_reported() {
		let err = App::from_config(&HubConfig::default()).err().unwrap();
		assert!(err.to_string().contains("no driver configured"));
	}

	#[tokio::test]
	async fn websocket_flag_controls_broadcast_sink() {
		let connector = Arc::new(FakeConnector::new());
		let config = HubConfig {
			store: StoreConfig::Memory,
			..HubConfig::default()
		};
		let app = App::with_connector(&config, connector.clone()).unwrap();
		assert!(app.broadcast.is_none());
		assert_eq!(app.manager.bridge().sink_count(), 0);

		let config = HubConfig {
			store: StoreConfig::Memory,
			enable_websocket: true,
			webhook_url: Some("http://127.0.0.1:9/hook".into()),
			..HubConfig::default()
		};
		let app = App::with_connector(&config, connector).unwrap();
		assert!(app.broadcast.is_some());
		assert_eq!(app.manager.bridge().sink_count(), 2);
	}
}
