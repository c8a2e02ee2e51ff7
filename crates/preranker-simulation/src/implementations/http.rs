//! HTTP backend for the simulator's dry-run interface.

use crate::SimulatorClient;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use preranker_types::errors::{EngineError, Result};
use preranker_types::DryRun;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpSimulatorConfig {
	pub endpoint: String,
	pub timeout: Duration,
	pub max_concurrent_requests: usize,
}

impl Default for HttpSimulatorConfig {
	fn default() -> Self {
		Self {
			endpoint: "http://localhost:9200".to_string(),
			timeout: Duration::from_secs(10),
			max_concurrent_requests: 16,
		}
	}
}

#[derive(Serialize)]
struct DryRunRequest {
	transaction_bytes_b64: String,
}

pub struct HttpSimulatorClient {
	client: reqwest::Client,
	config: HttpSimulatorConfig,
	/// Caps in-flight dry runs against the simulator service.
	permits: Arc<Semaphore>,
}

impl HttpSimulatorClient {
	pub fn new(config: HttpSimulatorConfig) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(config.timeout)
			.build()
			.map_err(|e| EngineError::Config(format!("failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
			config,
		})
	}
}

#[async_trait]
impl SimulatorClient for HttpSimulatorClient {
	async fn dry_run(&self, transaction_bytes: &[u8]) -> Result<DryRun> {
		let _permit = self
			.permits
			.acquire()
			.await
			.map_err(|_| EngineError::Internal("simulator semaphore closed".into()))?;

		let url = format!("{}/dry_run", self.config.endpoint.trim_end_matches('/'));
		let request = DryRunRequest {
			transaction_bytes_b64: STANDARD.encode(transaction_bytes),
		};

		let response = self
			.client
			.post(url)
			.json(&request)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					EngineError::Timeout("dry_run")
				} else {
					EngineError::transient("dry_run", e.to_string())
				}
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(EngineError::transient(
				"dry_run",
				format!("simulator returned status {}", status),
			));
		}

		let dry_run: DryRun = response
			.json()
			.await
			.map_err(|e| EngineError::Simulation(format!("malformed dry-run response: {}", e)))?;

		debug!(
			status = ?dry_run.status,
			gas = dry_run.total_gas(),
			"Dry run completed"
		);
		Ok(dry_run)
	}
}
