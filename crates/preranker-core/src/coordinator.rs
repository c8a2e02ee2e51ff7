//! Intent lifecycle coordinator.
//!
//! Owns the active-intent map and consumes the ordered event stream. Intent
//! opens settle inline before the handoff returns; solution arrivals run on
//! a bounded worker pool and their results commit under the per-intent gate.
//! Window-close timers do not touch state themselves, they post the intent
//! id onto the flush mailbox and the flush loop does the rest.

use crate::context::IntentContext;
use async_trait::async_trait;
use dashmap::DashMap;
use preranker_blob::BlobFetcher;
use preranker_delivery::RankingPublisher;
use preranker_discovery::{EventHandler, HandlerAck};
use preranker_pipeline::{PipelineOutcome, SolutionPipeline};
use preranker_storage::{IntentStore, PutOutcome};
use preranker_types::records::FlushPayload;
use preranker_types::{
	ChainEvent, IntentId, IntentSubmittedEvent, SolutionSubmittedEvent,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
	pub pipeline_concurrency: usize,
	pub flush_on_empty_passed: bool,
	/// Delete the intent tree right after a flush instead of waiting for TTL.
	pub eager_delete: bool,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			pipeline_concurrency: 16,
			flush_on_empty_passed: false,
			eager_delete: false,
		}
	}
}

#[derive(Default)]
struct Stats {
	intents_opened: AtomicU64,
	intents_flushed: AtomicU64,
	intents_closed_empty: AtomicU64,
	solutions_passed: AtomicU64,
	solutions_failed: AtomicU64,
	late_solutions_dropped: AtomicU64,
}

/// Point-in-time counters for the operational surface.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
	pub intents_opened: u64,
	pub intents_flushed: u64,
	pub intents_closed_empty: u64,
	pub solutions_passed: u64,
	pub solutions_failed: u64,
	pub late_solutions_dropped: u64,
}

#[derive(Clone)]
pub struct Coordinator {
	intents: Arc<DashMap<IntentId, Arc<IntentContext>>>,
	store: Arc<IntentStore>,
	blob: Arc<dyn BlobFetcher>,
	pipeline: Arc<SolutionPipeline>,
	publisher: Arc<dyn RankingPublisher>,
	permits: Arc<Semaphore>,
	flush_tx: mpsc::UnboundedSender<IntentId>,
	config: Arc<CoordinatorConfig>,
	stats: Arc<Stats>,
}

impl Coordinator {
	pub fn new(
		store: Arc<IntentStore>,
		blob: Arc<dyn BlobFetcher>,
		pipeline: Arc<SolutionPipeline>,
		publisher: Arc<dyn RankingPublisher>,
		config: CoordinatorConfig,
	) -> (Self, mpsc::UnboundedReceiver<IntentId>) {
		let (flush_tx, flush_rx) = mpsc::unbounded_channel();
		let permits = Arc::new(Semaphore::new(config.pipeline_concurrency));

		let coordinator = Self {
			intents: Arc::new(DashMap::new()),
			store,
			blob,
			pipeline,
			publisher,
			permits,
			flush_tx,
			config: Arc::new(config),
			stats: Arc::new(Stats::default()),
		};
		(coordinator, flush_rx)
	}

	pub fn active_intent_count(&self) -> usize {
		self.intents.len()
	}

	pub fn stats_snapshot(&self) -> StatsSnapshot {
		StatsSnapshot {
			intents_opened: self.stats.intents_opened.load(Ordering::Relaxed),
			intents_flushed: self.stats.intents_flushed.load(Ordering::Relaxed),
			intents_closed_empty: self.stats.intents_closed_empty.load(Ordering::Relaxed),
			solutions_passed: self.stats.solutions_passed.load(Ordering::Relaxed),
			solutions_failed: self.stats.solutions_failed.load(Ordering::Relaxed),
			late_solutions_dropped: self.stats.late_solutions_dropped.load(Ordering::Relaxed),
		}
	}

	/// Consume flush-due messages from window timers and manual triggers
	/// until shutdown.
	pub async fn flush_loop(
		self,
		mut flush_rx: mpsc::UnboundedReceiver<IntentId>,
		mut shutdown: broadcast::Receiver<()>,
	) {
		loop {
			tokio::select! {
				Some(intent_id) = flush_rx.recv() => {
					self.flush(&intent_id).await;
				}
				_ = shutdown.recv() => {
					info!("Flush loop received shutdown signal");
					break;
				}
			}
		}
	}

	async fn handle_intent_submitted(&self, event: IntentSubmittedEvent) {
		if self.intents.contains_key(&event.intent_id) {
			error!(
				intent_id = %event.intent_id,
				"Duplicate intent-submitted event for an active intent, dropping"
			);
			return;
		}

		let intent = match self.blob.fetch_intent(&event.blob_id).await {
			Ok(intent) => intent,
			Err(e) => {
				warn!(
					intent_id = %event.intent_id,
					blob_id = %event.blob_id,
					error = %e,
					"Failed to fetch intent body, dropping event"
				);
				return;
			}
		};
		if intent.window_end_ms != event.window_end_ms {
			debug!(
				intent_id = %event.intent_id,
				body = intent.window_end_ms,
				event = event.window_end_ms,
				"Window end differs between event and body, using the body"
			);
		}

		if let Err(e) = self.store.put_intent(&intent).await {
			warn!(
				intent_id = %event.intent_id,
				error = %e,
				"Failed to persist intent body, dropping event"
			);
			return;
		}

		let ctx = Arc::new(IntentContext::new(intent));
		let window_end_ms = ctx.window_end_ms;

		match self.intents.entry(event.intent_id.clone()) {
			dashmap::mapref::entry::Entry::Occupied(_) => {
				error!(intent_id = %event.intent_id, "Intent context appeared concurrently, dropping");
				return;
			}
			dashmap::mapref::entry::Entry::Vacant(vacant) => {
				vacant.insert(ctx.clone());
			}
		}

		// The timer only posts a message; flushing stays a coordinator-local
		// operation and cancellation is a plain task abort.
		let delay = Duration::from_millis(window_end_ms.saturating_sub(now_ms()));
		let flush_tx = self.flush_tx.clone();
		let intent_id = event.intent_id.clone();
		ctx.set_timer(tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			let _ = flush_tx.send(intent_id);
		}));

		self.stats.intents_opened.fetch_add(1, Ordering::Relaxed);
		info!(
			intent_id = %event.intent_id,
			window_end_ms,
			"Intent window opened"
		);
	}

	async fn handle_solution_submitted(&self, event: SolutionSubmittedEvent) -> HandlerAck {
		let Some(ctx) = self.intents.get(&event.intent_id).map(|e| e.value().clone()) else {
			// Normal for events that arrive after the window flushed.
			warn!(
				intent_id = %event.intent_id,
				solution_id = %event.solution_id,
				"Solution for inactive intent, dropping"
			);
			self.stats.late_solutions_dropped.fetch_add(1, Ordering::Relaxed);
			return HandlerAck::Completed;
		};

		// Acquiring the worker permit before returning makes pool saturation
		// back-pressure the ingestor's handoff.
		let permit = match self.permits.clone().acquire_owned().await {
			Ok(permit) => permit,
			Err(_) => return HandlerAck::Completed,
		};

		let coordinator = self.clone();
		let handle = tokio::spawn(async move {
			let _permit = permit;
			let outcome = coordinator.pipeline.process(&ctx.intent, &event).await;
			coordinator.commit_outcome(&ctx, outcome).await;
		});

		HandlerAck::Pending(handle)
	}

	/// Record a pipeline outcome under the per-intent gate. Results arriving
	/// after the intent left ACCEPTING are discarded.
	async fn commit_outcome(&self, ctx: &IntentContext, outcome: PipelineOutcome) {
		let _gate = ctx.gate.lock().await;
		if !ctx.is_accepting() {
			debug!(
				intent_id = %ctx.intent.intent_id,
				"Discarding pipeline result for a closed intent"
			);
			return;
		}

		let intent_id = &ctx.intent.intent_id;
		match outcome {
			PipelineOutcome::Passed(record) => {
				match self.store.put_passed(intent_id, &record).await {
					Ok(PutOutcome::Stored) => {
						ctx.passed_count.fetch_add(1, Ordering::Relaxed);
						self.stats.solutions_passed.fetch_add(1, Ordering::Relaxed);
					}
					Ok(PutOutcome::Duplicate) => {
						debug!(
							intent_id = %intent_id,
							solution_id = %record.solution_id,
							"Replayed solution already recorded"
						);
					}
					Ok(PutOutcome::Discarded) => {}
					Err(e) => {
						error!(
							intent_id = %intent_id,
							solution_id = %record.solution_id,
							error = %e,
							"Failed to store passed record"
						);
					}
				}
			}
			PipelineOutcome::Failed(record) => {
				match self.store.put_failed(intent_id, &record).await {
					Ok(PutOutcome::Stored) => {
						ctx.failed_count.fetch_add(1, Ordering::Relaxed);
						self.stats.solutions_failed.fetch_add(1, Ordering::Relaxed);
						debug!(
							intent_id = %intent_id,
							solution_id = %record.solution_id,
							reason = %record.reason,
							"Solution failed pre-ranking"
						);
					}
					Ok(PutOutcome::Duplicate) => {}
					Ok(PutOutcome::Discarded) => {}
					Err(e) => {
						error!(
							intent_id = %intent_id,
							solution_id = %record.solution_id,
							error = %e,
							"Failed to store failed record"
						);
					}
				}
			}
		}
	}

	/// Close the window and hand the passed set to the ranking consumer.
	/// Safe under concurrent triggers: exactly one caller wins the CAS, the
	/// rest return. Every error in here is swallowed, the intent's state is
	/// released regardless.
	pub async fn flush(&self, intent_id: &IntentId) {
		let Some(ctx) = self.intents.get(intent_id).map(|e| e.value().clone()) else {
			debug!(intent_id = %intent_id, "Flush requested for inactive intent");
			return;
		};

		let _gate = ctx.gate.lock().await;
		if !ctx.begin_flush() {
			debug!(intent_id = %intent_id, "Flush already started elsewhere");
			return;
		}
		ctx.cancel_timer();

		let passed = ctx.passed_count.load(Ordering::Relaxed);
		if passed == 0 && !self.config.flush_on_empty_passed {
			info!(intent_id = %intent_id, "Window closed with no passing solutions");
			if let Err(e) = self.store.delete_intent_tree(intent_id).await {
				warn!(intent_id = %intent_id, error = %e, "Failed to delete empty intent tree");
			}
			self.stats.intents_closed_empty.fetch_add(1, Ordering::Relaxed);
		} else {
			let passed_solutions = match self.store.list_passed(intent_id).await {
				Ok(records) => records,
				Err(e) => {
					error!(intent_id = %intent_id, error = %e, "Failed to read passed set at flush");
					Vec::new()
				}
			};
			let failed = match self.store.count_failed(intent_id).await {
				Ok(count) => count,
				Err(_) => ctx.failed_count.load(Ordering::Relaxed),
			};

			let payload = FlushPayload {
				intent_id: intent_id.clone(),
				intent: ctx.intent.clone(),
				passed_solutions,
				total_solutions_submitted: passed + failed,
				window_closed_at: now_ms(),
			};

			if let Err(e) = self.publisher.enqueue(&payload).await {
				// Retries are exhausted inside the publisher; the intent is
				// lost for ranking and state is not rolled back.
				error!(intent_id = %intent_id, error = %e, "Ranking enqueue failed, intent lost");
			} else {
				self.stats.intents_flushed.fetch_add(1, Ordering::Relaxed);
			}

			if self.config.eager_delete {
				if let Err(e) = self.store.delete_intent_tree(intent_id).await {
					warn!(intent_id = %intent_id, error = %e, "Failed to eagerly delete intent tree");
				}
			}
		}

		ctx.terminate();
		self.intents.remove(intent_id);
		info!(intent_id = %intent_id, "Intent terminated");
	}
}

#[async_trait]
impl EventHandler for Coordinator {
	async fn handle_event(&self, event: ChainEvent) -> HandlerAck {
		match event {
			ChainEvent::IntentSubmitted(event) => {
				self.handle_intent_submitted(event).await;
				HandlerAck::Completed
			}
			ChainEvent::SolutionSubmitted(event) => self.handle_solution_submitted(event).await,
		}
	}
}

pub(crate) fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}
