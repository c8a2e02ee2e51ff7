//! Engine assembly: builds the collaborators from configuration, owns the
//! background tasks and exposes the operational surface.

use crate::coordinator::{Coordinator, CoordinatorConfig, StatsSnapshot};
use crate::error::CoreError;
use crate::lifecycle::EngineLifecycle;
use preranker_blob::{BlobFetcher, HttpBlobFetcher, HttpBlobFetcherConfig};
use preranker_config::EngineConfig;
use preranker_delivery::{QueuePublisher, QueuePublisherConfig, RankingPublisher};
use preranker_discovery::{
	EventIngestor, EventSource, IngestorConfig, RpcEventSource, RpcEventSourceConfig,
};
use preranker_pipeline::SolutionPipeline;
use preranker_simulation::{HttpSimulatorClient, HttpSimulatorConfig, SimulatorClient};
use preranker_storage::{
	create_kv_store, CursorStore, FileCursorStore, IntentStore, KvBackend, KvStore,
};
use preranker_types::errors::Result as EngineResult;
use preranker_types::{EventCursor, IntentId};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Read-only status snapshot served by the operational endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
	pub state: String,
	pub active_intent_count: usize,
	pub current_cursor: Option<EventCursor>,
	pub last_poll_ts: Option<u64>,
	pub stats: StatsSnapshot,
}

pub struct Engine {
	config: EngineConfig,
	coordinator: Coordinator,
	ingestor: Arc<EventIngestor>,
	kv: Arc<dyn KvStore>,
	lifecycle: Arc<EngineLifecycle>,
	tasks: Mutex<JoinSet<()>>,
	flush_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<IntentId>>>,
	listener_started: AtomicBool,
}

impl Engine {
	pub fn builder() -> EngineBuilder {
		EngineBuilder::new()
	}

	/// Start background processing: the flush loop, the TTL sweeper and,
	/// unless configured otherwise, the event listener.
	pub async fn start(&self) -> Result<(), CoreError> {
		info!("Starting pre-ranking engine");
		self.lifecycle.begin_start().await?;

		let flush_rx = self
			.flush_rx
			.lock()
			.expect("flush receiver lock poisoned")
			.take();
		let Some(flush_rx) = flush_rx else {
			self.lifecycle.fail("flush mailbox already consumed").await;
			return Err(CoreError::Lifecycle(
				"flush mailbox already consumed".to_string(),
			));
		};

		let mut tasks = self.tasks.lock().await;

		let coordinator = self.coordinator.clone();
		let shutdown = self.lifecycle.subscribe_shutdown();
		tasks.spawn(coordinator.flush_loop(flush_rx, shutdown));

		let kv = self.kv.clone();
		let mut shutdown = self.lifecycle.subscribe_shutdown();
		let sweep_interval = Duration::from_millis(self.config.store.cleanup_interval_ms.max(1000));
		tasks.spawn(async move {
			let mut ticker = tokio::time::interval(sweep_interval);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						match kv.cleanup().await {
							Ok(0) => {}
							Ok(reaped) => debug!(reaped, "Reaped expired store entries"),
							Err(e) => warn!(error = %e, "Store sweep failed"),
						}
					}
					_ = shutdown.recv() => break,
				}
			}
		});
		drop(tasks);

		if self.config.chain.auto_start_listener {
			self.start_listener().await;
		} else {
			info!("Event listener not auto-started");
		}

		self.lifecycle.mark_serving().await?;
		info!("Pre-ranking engine started");
		Ok(())
	}

	/// Start the event listener if it is not already running.
	pub async fn start_listener(&self) {
		if self.listener_started.swap(true, Ordering::SeqCst) {
			return;
		}
		let ingestor = self.ingestor.clone();
		let shutdown = self.lifecycle.subscribe_shutdown();
		self.tasks.lock().await.spawn(async move {
			ingestor.run(shutdown).await;
		});
	}

	/// Run a single poll cycle outside the listener loop. Used by tests and
	/// operational tooling.
	pub async fn poll_once(&self) -> EngineResult<()> {
		self.ingestor.tick().await
	}

	/// Manual flush trigger, bypassing the window timer.
	pub async fn flush(&self, intent_id: &IntentId) {
		info!(intent_id = %intent_id, "Manual flush requested");
		self.coordinator.flush(intent_id).await;
	}

	pub async fn status(&self) -> StatusReport {
		StatusReport {
			state: self.lifecycle.phase().await.to_string(),
			active_intent_count: self.coordinator.active_intent_count(),
			current_cursor: self.ingestor.current_cursor().await,
			last_poll_ts: self.ingestor.last_poll_ts(),
			stats: self.coordinator.stats_snapshot(),
		}
	}

	pub async fn is_running(&self) -> bool {
		self.lifecycle.is_serving().await
	}

	/// Gracefully stop all background tasks: broadcast the drain signal,
	/// wait the tasks out, then mark the engine stopped.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		info!("Shutting down pre-ranking engine");
		self.lifecycle.begin_drain().await?;
		self.tasks.lock().await.shutdown().await;
		self.lifecycle.mark_stopped().await?;
		info!("Engine shutdown complete");
		Ok(())
	}
}

/// Builder for the engine. Collaborators default to the HTTP/memory
/// implementations derived from the configuration; tests inject mocks.
pub struct EngineBuilder {
	config: Option<EngineConfig>,
	kv: Option<Arc<dyn KvStore>>,
	cursor_store: Option<Arc<dyn CursorStore>>,
	blob: Option<Arc<dyn BlobFetcher>>,
	simulator: Option<Arc<dyn SimulatorClient>>,
	source: Option<Arc<dyn EventSource>>,
	publisher: Option<Arc<dyn RankingPublisher>>,
}

impl EngineBuilder {
	pub fn new() -> Self {
		Self {
			config: None,
			kv: None,
			cursor_store: None,
			blob: None,
			simulator: None,
			source: None,
			publisher: None,
		}
	}

	pub fn with_config(mut self, config: EngineConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn with_kv_store(mut self, kv: Arc<dyn KvStore>) -> Self {
		self.kv = Some(kv);
		self
	}

	pub fn with_cursor_store(mut self, cursor_store: Arc<dyn CursorStore>) -> Self {
		self.cursor_store = Some(cursor_store);
		self
	}

	pub fn with_blob_fetcher(mut self, blob: Arc<dyn BlobFetcher>) -> Self {
		self.blob = Some(blob);
		self
	}

	pub fn with_simulator(mut self, simulator: Arc<dyn SimulatorClient>) -> Self {
		self.simulator = Some(simulator);
		self
	}

	pub fn with_event_source(mut self, source: Arc<dyn EventSource>) -> Self {
		self.source = Some(source);
		self
	}

	pub fn with_publisher(mut self, publisher: Arc<dyn RankingPublisher>) -> Self {
		self.publisher = Some(publisher);
		self
	}

	pub async fn build(self) -> Result<Engine, CoreError> {
		let config = self
			.config
			.ok_or_else(|| CoreError::Configuration("no configuration provided".to_string()))?;

		let kv: Arc<dyn KvStore> = match self.kv {
			Some(kv) => kv,
			None => {
				let backend = match config.store.backend.as_str() {
					"memory" => KvBackend::Memory,
					other => {
						return Err(CoreError::Configuration(format!(
							"unknown store backend '{}'",
							other
						)))
					}
				};
				create_kv_store(backend).map_err(CoreError::Engine)?
			}
		};

		let cursor_store: Arc<dyn CursorStore> = match self.cursor_store {
			Some(store) => store,
			None => Arc::new(
				FileCursorStore::new(&config.store.cursor_path)
					.await
					.map_err(|e| CoreError::Bootstrap(format!("cursor store unusable: {}", e)))?,
			),
		};

		let blob: Arc<dyn BlobFetcher> = match self.blob {
			Some(blob) => blob,
			None => Arc::new(
				HttpBlobFetcher::new(HttpBlobFetcherConfig {
					endpoint: config.blob.endpoint.clone(),
					fetch_timeout: Duration::from_millis(config.blob.fetch_timeout_ms),
					max_retries: config.blob.max_retries,
					max_concurrent_requests: config.blob.max_concurrent_requests,
				})
				.map_err(CoreError::Engine)?,
			),
		};

		let simulator: Arc<dyn SimulatorClient> = match self.simulator {
			Some(simulator) => simulator,
			None => Arc::new(
				HttpSimulatorClient::new(HttpSimulatorConfig {
					endpoint: config.simulator.endpoint.clone(),
					timeout: Duration::from_millis(config.simulator.simulator_timeout_ms),
					max_concurrent_requests: config.simulator.max_concurrent_requests,
				})
				.map_err(CoreError::Engine)?,
			),
		};

		let source: Arc<dyn EventSource> = match self.source {
			Some(source) => source,
			None => Arc::new(
				RpcEventSource::new(RpcEventSourceConfig {
					endpoint: config.chain.rpc_url.clone(),
					request_timeout: Duration::from_secs(5),
				})
				.map_err(CoreError::Engine)?,
			),
		};

		let publisher: Arc<dyn RankingPublisher> = match self.publisher {
			Some(publisher) => publisher,
			None => Arc::new(QueuePublisher::new(
				kv.clone(),
				QueuePublisherConfig {
					queue_key: config.delivery.queue_key.clone(),
					enqueue_timeout: Duration::from_millis(config.delivery.enqueue_timeout_ms),
					max_attempts: config.delivery.max_attempts,
				},
			)),
		};

		let store = Arc::new(
			IntentStore::new(kv.clone(), Duration::from_millis(config.store.record_ttl_ms))
				.with_op_timeout(Duration::from_millis(config.store.store_timeout_ms)),
		);
		let pipeline = Arc::new(SolutionPipeline::new(blob.clone(), simulator));

		let (coordinator, flush_rx) = Coordinator::new(
			store,
			blob,
			pipeline,
			publisher,
			CoordinatorConfig {
				pipeline_concurrency: config.pipeline.pipeline_concurrency,
				flush_on_empty_passed: config.pipeline.flush_on_empty_passed,
				eager_delete: config.store.eager_delete,
			},
		);

		let ingestor = Arc::new(EventIngestor::new(
			source,
			cursor_store,
			Arc::new(coordinator.clone()),
			IngestorConfig {
				package_id: config.chain.package_id.clone(),
				poll_interval: Duration::from_millis(config.chain.event_poll_interval_ms),
				batch_limit: config.chain.event_batch_limit,
			},
		));

		// A cursor store that cannot answer at bootstrap is fatal.
		ingestor
			.init()
			.await
			.map_err(|e| CoreError::Bootstrap(format!("cursor store unreachable: {}", e)))?;

		Ok(Engine {
			config,
			coordinator,
			ingestor,
			kv,
			lifecycle: Arc::new(EngineLifecycle::new()),
			tasks: Mutex::new(JoinSet::new()),
			flush_rx: std::sync::Mutex::new(Some(flush_rx)),
			listener_started: AtomicBool::new(false),
		})
	}
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}
