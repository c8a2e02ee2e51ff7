//! Engine configuration: structure, defaults and validation.

pub mod loader;

pub use loader::{load_config, ConfigLoader};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Parse error: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("Validation error: {0}")]
	Validation(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub service: ServiceConfig,
	pub chain: ChainConfig,
	pub blob: BlobConfig,
	pub simulator: SimulatorConfig,
	pub store: StoreConfig,
	pub pipeline: PipelineConfig,
	pub delivery: DeliveryConfig,
	pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
	pub name: String,
	pub log_level: String,
	pub log_json: bool,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			name: "preranker".to_string(),
			log_level: "info".to_string(),
			log_json: false,
		}
	}
}

/// Event ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
	/// JSON-RPC endpoint of the chain event source.
	pub rpc_url: String,
	/// Package whose intent and solution events are consumed.
	pub package_id: String,
	pub event_poll_interval_ms: u64,
	pub event_batch_limit: usize,
	/// If false the ingestor stays inert until started explicitly.
	pub auto_start_listener: bool,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self {
			rpc_url: String::new(),
			package_id: String::new(),
			event_poll_interval_ms: 2000,
			event_batch_limit: 50,
			auto_start_listener: true,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
	pub endpoint: String,
	pub fetch_timeout_ms: u64,
	pub max_retries: u32,
	/// Cap on in-flight blob requests, protecting the upstream store.
	pub max_concurrent_requests: usize,
}

impl Default for BlobConfig {
	fn default() -> Self {
		Self {
			endpoint: String::new(),
			fetch_timeout_ms: 5000,
			max_retries: 3,
			max_concurrent_requests: 32,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
	pub endpoint: String,
	pub simulator_timeout_ms: u64,
	pub max_concurrent_requests: usize,
}

impl Default for SimulatorConfig {
	fn default() -> Self {
		Self {
			endpoint: String::new(),
			simulator_timeout_ms: 10_000,
			max_concurrent_requests: 16,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
	/// Backend for per-intent records ("memory" is the only built-in).
	pub backend: String,
	pub record_ttl_ms: u64,
	pub store_timeout_ms: u64,
	/// Where the durable event cursor lives.
	pub cursor_path: String,
	/// Delete the intent tree immediately after a flush instead of
	/// letting records age out through their TTL.
	pub eager_delete: bool,
	/// Interval of the TTL sweeper task.
	pub cleanup_interval_ms: u64,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			record_ttl_ms: 3_600_000,
			store_timeout_ms: 1000,
			cursor_path: "./data/cursor.json".to_string(),
			eager_delete: false,
			cleanup_interval_ms: 60_000,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	/// Size of the pipeline worker pool.
	pub pipeline_concurrency: usize,
	/// If true an empty passed set still produces a ranking payload.
	pub flush_on_empty_passed: bool,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			pipeline_concurrency: 16,
			flush_on_empty_passed: false,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
	pub queue_key: String,
	pub enqueue_timeout_ms: u64,
	pub max_attempts: u32,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			queue_key: "ranking:queue".to_string(),
			enqueue_timeout_ms: 2000,
			max_attempts: 5,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
	pub enabled: bool,
	pub host: String,
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: "127.0.0.1".to_string(),
			port: 8090,
		}
	}
}

impl EngineConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.rpc_url.is_empty() {
			return Err(ConfigError::Validation("chain.rpc_url cannot be empty".into()));
		}
		if self.chain.package_id.is_empty() {
			return Err(ConfigError::Validation(
				"chain.package_id cannot be empty".into(),
			));
		}
		if self.chain.event_poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"chain.event_poll_interval_ms must be positive".into(),
			));
		}
		if self.chain.event_batch_limit == 0 {
			return Err(ConfigError::Validation(
				"chain.event_batch_limit must be positive".into(),
			));
		}
		if self.blob.endpoint.is_empty() {
			return Err(ConfigError::Validation("blob.endpoint cannot be empty".into()));
		}
		if self.simulator.endpoint.is_empty() {
			return Err(ConfigError::Validation(
				"simulator.endpoint cannot be empty".into(),
			));
		}
		if self.store.backend != "memory" {
			return Err(ConfigError::Validation(format!(
				"unknown store backend '{}'",
				self.store.backend
			)));
		}
		if self.store.cursor_path.is_empty() {
			return Err(ConfigError::Validation(
				"store.cursor_path cannot be empty".into(),
			));
		}
		if self.pipeline.pipeline_concurrency == 0 {
			return Err(ConfigError::Validation(
				"pipeline.pipeline_concurrency must be positive".into(),
			));
		}
		if self.delivery.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"delivery.max_attempts must be positive".into(),
			));
		}
		Ok(())
	}
}
