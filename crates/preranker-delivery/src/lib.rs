//! At-least-once handoff of flush payloads to the ranking consumer queue.

use async_trait::async_trait;
use bytes::Bytes;
use preranker_ratelimit::ExponentialBackoff;
use preranker_storage::KvStore;
use preranker_types::errors::{EngineError, Result};
use preranker_types::records::FlushPayload;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Publishes one payload per flushed intent. Delivery is at-least-once;
/// consumers dedupe on `intent_id`.
#[async_trait]
pub trait RankingPublisher: Send + Sync {
	async fn enqueue(&self, payload: &FlushPayload) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct QueuePublisherConfig {
	pub queue_key: String,
	pub enqueue_timeout: Duration,
	pub max_attempts: u32,
}

impl Default for QueuePublisherConfig {
	fn default() -> Self {
		Self {
			queue_key: "ranking:queue".to_string(),
			enqueue_timeout: Duration::from_secs(2),
			max_attempts: 5,
		}
	}
}

/// List-push publisher over the keyed state store.
pub struct QueuePublisher {
	kv: Arc<dyn KvStore>,
	config: QueuePublisherConfig,
}

impl QueuePublisher {
	pub fn new(kv: Arc<dyn KvStore>, config: QueuePublisherConfig) -> Self {
		Self { kv, config }
	}
}

#[async_trait]
impl RankingPublisher for QueuePublisher {
	async fn enqueue(&self, payload: &FlushPayload) -> Result<()> {
		let encoded = serde_json::to_vec(payload)
			.map_err(|e| EngineError::Delivery(format!("failed to encode flush payload: {}", e)))?;
		let encoded = Bytes::from(encoded);

		let mut backoff =
			ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(5))
				.with_jitter(0.3);

		loop {
			let attempt = tokio::time::timeout(
				self.config.enqueue_timeout,
				self.kv.list_push(&self.config.queue_key, encoded.clone()),
			)
			.await;

			match attempt {
				Ok(Ok(depth)) => {
					info!(
						intent_id = %payload.intent_id,
						solutions = payload.passed_solutions.len(),
						queue_depth = depth,
						"Flush payload enqueued for ranking"
					);
					return Ok(());
				}
				Ok(Err(e)) if backoff.current_attempt() + 1 < self.config.max_attempts => {
					let delay = backoff.next_delay();
					warn!(
						intent_id = %payload.intent_id,
						attempt = backoff.current_attempt(),
						error = %e,
						"Enqueue failed, retrying in {:?}",
						delay
					);
					tokio::time::sleep(delay).await;
				}
				Ok(Err(e)) => {
					error!(
						intent_id = %payload.intent_id,
						error = %e,
						"Enqueue retry budget exhausted, intent lost"
					);
					return Err(EngineError::Delivery(format!(
						"enqueue failed after {} attempts: {}",
						self.config.max_attempts, e
					)));
				}
				Err(_) if backoff.current_attempt() + 1 < self.config.max_attempts => {
					let delay = backoff.next_delay();
					warn!(
						intent_id = %payload.intent_id,
						attempt = backoff.current_attempt(),
						"Enqueue timed out, retrying in {:?}",
						delay
					);
					tokio::time::sleep(delay).await;
				}
				Err(_) => {
					error!(
						intent_id = %payload.intent_id,
						"Enqueue retry budget exhausted on timeout, intent lost"
					);
					return Err(EngineError::Timeout("ranking_enqueue"));
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use preranker_storage::MemoryKvStore;
	use preranker_types::{
		Constraints, Intent, Operation, OperationMode,
	};
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration as StdDuration;

	fn payload(intent_id: &str) -> FlushPayload {
		FlushPayload {
			intent_id: intent_id.into(),
			intent: Intent {
				intent_id: intent_id.into(),
				user_address: "0xuser".to_string(),
				window_start_ms: 0,
				window_end_ms: 5000,
				operation: Operation {
					mode: OperationMode::Swap,
					inputs: vec![],
					outputs: vec![],
					expected_outputs: None,
				},
				constraints: Constraints::default(),
			},
			passed_solutions: vec![],
			total_solutions_submitted: 3,
			window_closed_at: 5000,
		}
	}

	/// KV wrapper whose list_push fails a configured number of times first.
	struct FlakyKv {
		inner: MemoryKvStore,
		failures_left: AtomicU32,
	}

	#[async_trait]
	impl KvStore for FlakyKv {
		async fn set(&self, key: &str, value: Bytes, ttl: Option<StdDuration>) -> Result<()> {
			self.inner.set(key, value, ttl).await
		}
		async fn get(&self, key: &str) -> Result<Option<Bytes>> {
			self.inner.get(key).await
		}
		async fn exists(&self, key: &str) -> Result<bool> {
			self.inner.exists(key).await
		}
		async fn set_add(&self, key: &str, member: &str, ttl: Option<StdDuration>) -> Result<bool> {
			self.inner.set_add(key, member, ttl).await
		}
		async fn set_members(&self, key: &str) -> Result<Vec<String>> {
			self.inner.set_members(key).await
		}
		async fn set_card(&self, key: &str) -> Result<u64> {
			self.inner.set_card(key).await
		}
		async fn list_push(&self, key: &str, value: Bytes) -> Result<u64> {
			if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
				n.checked_sub(1)
			}).is_ok()
			{
				return Err(EngineError::transient("list_push", "connection reset"));
			}
			self.inner.list_push(key, value).await
		}
		async fn list_range(&self, key: &str) -> Result<Vec<Bytes>> {
			self.inner.list_range(key).await
		}
		async fn del(&self, keys: &[String]) -> Result<u64> {
			self.inner.del(keys).await
		}
		async fn cleanup(&self) -> Result<u64> {
			self.inner.cleanup().await
		}
	}

	#[tokio::test]
	async fn test_enqueue_pushes_payload_json() {
		let kv = Arc::new(MemoryKvStore::new());
		let publisher = QueuePublisher::new(kv.clone(), QueuePublisherConfig::default());

		publisher.enqueue(&payload("intent-1")).await.unwrap();

		let items = kv.list_range("ranking:queue").await.unwrap();
		assert_eq!(items.len(), 1);
		let decoded: FlushPayload = serde_json::from_slice(&items[0]).unwrap();
		assert_eq!(decoded.intent_id.as_str(), "intent-1");
		assert_eq!(decoded.total_solutions_submitted, 3);
	}

	#[tokio::test]
	async fn test_enqueue_retries_past_transient_failures() {
		let kv = Arc::new(FlakyKv {
			inner: MemoryKvStore::new(),
			failures_left: AtomicU32::new(2),
		});
		let publisher = QueuePublisher::new(
			kv.clone(),
			QueuePublisherConfig {
				max_attempts: 5,
				..Default::default()
			},
		);

		publisher.enqueue(&payload("intent-1")).await.unwrap();
		assert_eq!(kv.list_range("ranking:queue").await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_enqueue_gives_up_after_budget() {
		let kv = Arc::new(FlakyKv {
			inner: MemoryKvStore::new(),
			failures_left: AtomicU32::new(100),
		});
		let publisher = QueuePublisher::new(
			kv.clone(),
			QueuePublisherConfig {
				max_attempts: 3,
				..Default::default()
			},
		);

		assert!(publisher.enqueue(&payload("intent-1")).await.is_err());
		assert!(kv.list_range("ranking:queue").await.unwrap().is_empty());
	}
}
