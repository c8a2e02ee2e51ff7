//! HTTP backend for the blob store's `GET /blob/{blob_id}` interface.

use crate::BlobFetcher;
use async_trait::async_trait;
use preranker_ratelimit::ExponentialBackoff;
use preranker_types::errors::{EngineError, Result};
use preranker_types::{Intent, Solution};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpBlobFetcherConfig {
	pub endpoint: String,
	pub fetch_timeout: Duration,
	pub max_retries: u32,
	pub max_concurrent_requests: usize,
}

impl Default for HttpBlobFetcherConfig {
	fn default() -> Self {
		Self {
			endpoint: "http://localhost:9100".to_string(),
			fetch_timeout: Duration::from_secs(5),
			max_retries: 3,
			max_concurrent_requests: 32,
		}
	}
}

pub struct HttpBlobFetcher {
	client: reqwest::Client,
	config: HttpBlobFetcherConfig,
	/// Caps in-flight requests against the upstream store.
	permits: Arc<Semaphore>,
}

impl HttpBlobFetcher {
	pub fn new(config: HttpBlobFetcherConfig) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(config.fetch_timeout)
			.build()
			.map_err(|e| EngineError::Config(format!("failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
			config,
		})
	}

	fn blob_url(&self, blob_id: &str) -> String {
		format!("{}/blob/{}", self.config.endpoint.trim_end_matches('/'), blob_id)
	}

	/// One GET attempt, classified into terminal vs transient failures.
	async fn fetch_once<T: DeserializeOwned>(&self, blob_id: &str) -> Result<T> {
		let response = self
			.client
			.get(self.blob_url(blob_id))
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					EngineError::Timeout("blob_fetch")
				} else {
					EngineError::transient("blob_fetch", e.to_string())
				}
			})?;

		let status = response.status();
		if status == reqwest::StatusCode::NOT_FOUND {
			return Err(EngineError::BlobNotFound(blob_id.to_string()));
		}
		if !status.is_success() {
			return Err(EngineError::transient(
				"blob_fetch",
				format!("blob store returned status {}", status),
			));
		}

		let bytes = response
			.bytes()
			.await
			.map_err(|e| EngineError::transient("blob_fetch", e.to_string()))?;

		serde_json::from_slice(&bytes)
			.map_err(|e| EngineError::BlobCorrupt(format!("{}: {}", blob_id, e)))
	}

	async fn fetch_with_retries<T: DeserializeOwned>(&self, blob_id: &str) -> Result<T> {
		let _permit = self
			.permits
			.acquire()
			.await
			.map_err(|_| EngineError::Internal("blob fetcher semaphore closed".into()))?;

		let mut backoff =
			ExponentialBackoff::new(Duration::from_millis(200), Duration::from_secs(5))
				.with_jitter(0.3);

		loop {
			match self.fetch_once(blob_id).await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_transient() && backoff.current_attempt() < self.config.max_retries => {
					let delay = backoff.next_delay();
					warn!(
						blob_id = %blob_id,
						attempt = backoff.current_attempt(),
						error = %e,
						"Transient blob fetch failure, retrying in {:?}",
						delay
					);
					tokio::time::sleep(delay).await;
				}
				Err(e) => {
					debug!(blob_id = %blob_id, error = %e, "Blob fetch failed");
					return Err(e);
				}
			}
		}
	}
}

#[async_trait]
impl BlobFetcher for HttpBlobFetcher {
	async fn fetch_intent(&self, blob_id: &str) -> Result<Intent> {
		self.fetch_with_retries(blob_id).await
	}

	async fn fetch_solution(&self, blob_id: &str) -> Result<Solution> {
		self.fetch_with_retries(blob_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_blob_url_joins_cleanly() {
		let fetcher = HttpBlobFetcher::new(HttpBlobFetcherConfig {
			endpoint: "http://store.example/".to_string(),
			..Default::default()
		})
		.unwrap();

		assert_eq!(fetcher.blob_url("abc123"), "http://store.example/blob/abc123");
	}
}
