//! Configuration loading from files and environment.

use crate::{ConfigError, EngineConfig};
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from a TOML file.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let contents = std::fs::read_to_string(path)?;
		let config = Self::from_toml(&contents)?;
		config.validate()?;
		Ok(config)
	}

	/// Load from a TOML string.
	pub fn from_toml(contents: &str) -> Result<EngineConfig, ConfigError> {
		Ok(toml::from_str(contents)?)
	}

	/// Load from a file (when given) with environment overrides applied on top.
	pub fn from_env_and_file(file_path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
		let mut config = if let Some(path) = file_path {
			let contents = std::fs::read_to_string(path)?;
			Self::from_toml(&contents)?
		} else {
			EngineConfig::default()
		};

		Self::apply_env_overrides(&mut config);

		config.validate()?;
		Ok(config)
	}

	fn apply_env_overrides(config: &mut EngineConfig) {
		if let Ok(url) = std::env::var("PRERANKER_RPC_URL") {
			debug!("Overriding chain.rpc_url from environment");
			config.chain.rpc_url = url;
		}
		if let Ok(package) = std::env::var("PRERANKER_PACKAGE_ID") {
			debug!("Overriding chain.package_id from environment");
			config.chain.package_id = package;
		}
		if let Ok(endpoint) = std::env::var("PRERANKER_BLOB_ENDPOINT") {
			debug!("Overriding blob.endpoint from environment");
			config.blob.endpoint = endpoint;
		}
		if let Ok(endpoint) = std::env::var("PRERANKER_SIMULATOR_ENDPOINT") {
			debug!("Overriding simulator.endpoint from environment");
			config.simulator.endpoint = endpoint;
		}
		if let Ok(level) = std::env::var("PRERANKER_LOG_LEVEL") {
			config.service.log_level = level;
		}
	}
}

/// Load configuration from standard locations:
/// 1. `PRERANKER_CONFIG` environment variable
/// 2. `./config.toml`
/// 3. `/etc/preranker/config.toml`
/// 4. defaults with env overrides
pub fn load_config() -> Result<EngineConfig, ConfigError> {
	if let Ok(path) = std::env::var("PRERANKER_CONFIG") {
		return ConfigLoader::from_env_and_file(Some(Path::new(&path)));
	}

	let paths = ["./config.toml", "/etc/preranker/config.toml"];

	for path in &paths {
		if Path::new(path).exists() {
			return ConfigLoader::from_env_and_file(Some(Path::new(path)));
		}
	}

	ConfigLoader::from_env_and_file(None)
}
