//! Config layering: defaults, then the JSON file, then flags and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sessiond::{DriverConfig, HubConfig, RestorePolicy, StoreConfig};
use tracing::debug;

use crate::cli::Cli;

const CONFIG_DIR_NAME: &str = "sessiond";
const CONFIG_FILE_NAME: &str = "config.json";

/// `<config dir>/sessiond/config.json`, e.g. `~/.config/sessiond/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Builds the effective config for this run.
///
/// An explicit `--config` must exist; the default location is optional.
pub fn resolve(cli: &Cli) -> Result<HubConfig> {
	let mut config = match &cli.config {
		Some(path) => load(path)?,
		None => match default_config_path().filter(|p| p.is_file()) {
			Some(path) => load(&path)?,
			None => HubConfig::default(),
		},
	};

	apply_overrides(&mut config, cli);
	config.validate().context("invalid configuration")?;
	Ok(config)
}

fn load(path: &Path) -> Result<HubConfig> {
	debug!(target = "sessiond", path = %path.display(), "loading config file");
	Ok(HubConfig::load(path)?)
}

fn apply_overrides(config: &mut HubConfig, cli: &Cli) {
	if let Some(listen) = &cli.listen {
		config.listen = listen.clone();
	}
	if let Some(url) = &cli.webhook_url {
		config.webhook_url = Some(url.clone());
	}
	if cli.enable_websocket {
		config.enable_websocket = true;
	}
	if cli.memory_store {
		config.store = StoreConfig::Memory;
	} else if let Some(dir) = &cli.store_dir {
		config.store = StoreConfig::File { dir: dir.clone() };
	}
	if let Some(program) = &cli.driver {
		config.driver = Some(DriverConfig {
			program: program.clone(),
			args: cli.driver_args.clone(),
		});
	} else if let Some(driver) = config.driver.as_mut().filter(|_| !cli.driver_args.is_empty()) {
		driver.args = cli.driver_args.clone();
	}
	if let Some(limit) = cli.max_concurrent_restores {
		config.max_concurrent_restores = Some(limit);
	}
	if cli.degrade_restore {
		config.restore_policy = RestorePolicy::Degrade;
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn flags_override_file_values() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("config.json");
		std::fs::write(
			&path,
			r#"{ "listen": "0.0.0.0:8080", "webhookUrl": "http://hooks.local/a", "store": { "kind": "file", "dir": "/var/lib/sessiond" } }"#,
		)
		.unwrap();

		let cli = Cli {
			config: Some(path),
			webhook_url: Some("https://hooks.example.com/b".into()),
			memory_store: true,
			degrade_restore: true,
			..Cli::default()
		};
		let config = resolve(&cli).unwrap();

		assert_eq!(config.listen, "0.0.0.0:8080");
		assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example.com/b"));
		assert_eq!(config.store, StoreConfig::Memory);
		assert_eq!(config.restore_policy, RestorePolicy::Degrade);
	}

	#[test]
	fn missing_explicit_config_is_an_error() {
		let cli = Cli {
			config: Some(PathBuf::from("/definitely/not/here.json")),
			..Cli::default()
		};
		assert!(resolve(&cli).is_err());
	}

	#[test]
	fn driver_flag_builds_driver_config() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("empty.json");
		std::fs::write(&path, "{}").unwrap();

		let cli = Cli {
			config: Some(path),
			driver: Some(PathBuf::from("/opt/driver")),
			driver_args: vec!["--headless".into()],
			max_concurrent_restores: Some(8),
			..Cli::default()
		};
		let config = resolve(&cli).unwrap();
		assert_eq!(config.driver.as_ref().map(|d| d.program.clone()), Some(PathBuf::from("/opt/driver")));
		assert_eq!(config.driver.map(|d| d.args), Some(vec!["--headless".to_string()]));
		assert_eq!(config.max_concurrent_restores, Some(8));
	}

	#[test]
	fn invalid_override_fails_validation() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("empty.json");
		std::fs::write(&path, "{}").unwrap();

		let cli = Cli {
			config: Some(path),
			listen: Some("not an address".into()),
			..Cli::default()
		};
		assert!(resolve(&cli).is_err());
	}
}
