//! Durable, ordered polling loop.
//!
//! Per tick: both streams are queried after the in-memory cursor, merged in
//! ascending position order and handed to the coordinator one by one. The
//! cursor is persisted only after every handoff of the tick has fully
//! settled, so a crash at any point re-delivers at most the tail of the tick
//! and the intent store's unique record keys absorb the replay.

use crate::source::{EventFilter, EventPage, EventSource};
use preranker_storage::CursorStore;
use preranker_types::errors::Result;
use preranker_types::{ChainEvent, EventCursor, EventPosition};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How the coordinator acknowledged a handed-off event.
pub enum HandlerAck {
	/// The event settled before the handoff returned.
	Completed,
	/// The event spawned background work; the handle resolves when the
	/// pipeline invocation has recorded its terminal outcome.
	Pending(JoinHandle<()>),
}

/// Consumer of the ordered event stream.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
	async fn handle_event(&self, event: ChainEvent) -> HandlerAck;
}

#[derive(Debug, Clone)]
pub struct IngestorConfig {
	pub package_id: String,
	pub poll_interval: Duration,
	pub batch_limit: usize,
}

impl Default for IngestorConfig {
	fn default() -> Self {
		Self {
			package_id: String::new(),
			poll_interval: Duration::from_secs(2),
			batch_limit: 50,
		}
	}
}

pub struct EventIngestor {
	source: Arc<dyn EventSource>,
	cursor_store: Arc<dyn CursorStore>,
	handler: Arc<dyn EventHandler>,
	config: IngestorConfig,
	cursor: RwLock<Option<EventCursor>>,
	/// Set when the in-memory cursor is ahead of the durable one.
	cursor_dirty: AtomicBool,
	last_poll_ts: AtomicU64,
}

impl EventIngestor {
	pub fn new(
		source: Arc<dyn EventSource>,
		cursor_store: Arc<dyn CursorStore>,
		handler: Arc<dyn EventHandler>,
		config: IngestorConfig,
	) -> Self {
		Self {
			source,
			cursor_store,
			handler,
			config,
			cursor: RwLock::new(None),
			cursor_dirty: AtomicBool::new(false),
			last_poll_ts: AtomicU64::new(0),
		}
	}

	/// Seed the in-memory cursor from the durable store. Failing here is
	/// fatal for bootstrap.
	pub async fn init(&self) -> Result<()> {
		let cursor = self.cursor_store.load().await?;
		match &cursor {
			Some(cursor) => info!(cursor = %cursor, "Resuming event consumption"),
			None => info!("No persisted cursor, consuming from the stream start"),
		}
		*self.cursor.write().await = cursor;
		Ok(())
	}

	/// The polling loop. Runs until the shutdown signal fires; individual
	/// tick failures are logged and retried on the next tick.
	pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
		let mut ticker = tokio::time::interval(self.config.poll_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		info!(
			package_id = %self.config.package_id,
			interval_ms = self.config.poll_interval.as_millis() as u64,
			"Event ingestor started"
		);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if let Err(e) = self.tick().await {
						error!(error = %e, "Event poll tick failed");
					}
				}
				_ = shutdown.recv() => {
					info!("Event ingestor received shutdown signal");
					break;
				}
			}
		}
	}

	pub async fn current_cursor(&self) -> Option<EventCursor> {
		self.cursor.read().await.clone()
	}

	pub fn last_poll_ts(&self) -> Option<u64> {
		match self.last_poll_ts.load(Ordering::Relaxed) {
			0 => None,
			ts => Some(ts),
		}
	}

	/// One poll cycle: query, merge, hand off, settle, persist.
	pub async fn tick(&self) -> Result<()> {
		let cursor = self.cursor.read().await.clone();

		let intent_filter = EventFilter::intent_submitted(&self.config.package_id);
		let solution_filter = EventFilter::solution_submitted(&self.config.package_id);

		let intent_page = self
			.source
			.query_events(&intent_filter, cursor.as_ref(), self.config.batch_limit)
			.await?;
		let solution_page = self
			.source
			.query_events(&solution_filter, cursor.as_ref(), self.config.batch_limit)
			.await?;

		self.last_poll_ts.store(now_ms(), Ordering::Relaxed);

		let advanced = self.dispatch(intent_page, solution_page).await;

		if let Some(position) = advanced {
			*self.cursor.write().await = Some(position);
			self.cursor_dirty.store(true, Ordering::Release);
		}

		// Persist whenever the durable value lags, including retries for a
		// store failure on an earlier tick. Never skip ahead on failure.
		if self.cursor_dirty.load(Ordering::Acquire) {
			if let Some(position) = self.cursor.read().await.clone() {
				match self.cursor_store.store(&position).await {
					Ok(()) => self.cursor_dirty.store(false, Ordering::Release),
					Err(e) => {
						warn!(cursor = %position, error = %e, "Cursor persistence failed, will retry next tick");
					}
				}
			}
		}

		Ok(())
	}

	/// Merge both pages, hand events off in ascending order and wait for
	/// every pending pipeline invocation. Returns the position the cursor
	/// may advance to, if any.
	async fn dispatch(&self, intent_page: EventPage, solution_page: EventPage) -> Option<EventPosition> {
		// A stream that hit its batch limit has unfetched events just past
		// its frontier; events of the other stream beyond that point must
		// wait for the next tick or ordering across ticks would break.
		let barrier = [&intent_page, &solution_page]
			.iter()
			.filter(|page| page.has_more)
			.filter_map(|page| page.last_position.clone())
			.min();

		let frontier = intent_page
			.last_position
			.clone()
			.into_iter()
			.chain(solution_page.last_position.clone())
			.max();

		let mut events: Vec<ChainEvent> = intent_page
			.events
			.into_iter()
			.chain(solution_page.events)
			.collect();
		events.sort_by(|a, b| a.position().cmp(b.position()));

		let mut pending = Vec::new();

		for event in events {
			if let Some(barrier) = &barrier {
				if event.position() > barrier {
					debug!(position = %event.position(), "Deferring event past batch barrier");
					break;
				}
			}
			match self.handler.handle_event(event).await {
				HandlerAck::Completed => {}
				HandlerAck::Pending(handle) => pending.push(handle),
			}
		}

		// The cursor must not move past an event whose pipeline invocation
		// has not reached a terminal record.
		for handle in pending {
			if let Err(e) = handle.await {
				warn!(error = %e, "Pipeline task aborted before settling");
			}
		}

		// Every fetched envelope at or below the barrier was handed off or
		// dropped as malformed, so the cursor may advance to the barrier;
		// with no barrier it may advance over the whole fetched frontier.
		barrier.or(frontier)
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use preranker_storage::MemoryCursorStore;
	use preranker_types::{IntentSubmittedEvent, SolutionSubmittedEvent};
	use std::collections::VecDeque;
	use std::sync::Mutex;

	fn intent_event(seq: u64, intent_id: &str) -> ChainEvent {
		ChainEvent::IntentSubmitted(IntentSubmittedEvent {
			intent_id: intent_id.into(),
			blob_id: format!("blob-{}", intent_id),
			window_end_ms: 5000,
			position: EventPosition::new(seq, format!("digest-{}", seq)),
		})
	}

	fn solution_event(seq: u64, intent_id: &str, solution_id: &str) -> ChainEvent {
		ChainEvent::SolutionSubmitted(SolutionSubmittedEvent {
			intent_id: intent_id.into(),
			solution_id: solution_id.into(),
			blob_id: format!("blob-{}", solution_id),
			solver_address: "0xsolver".to_string(),
			submitted_at_ms: 100,
			position: EventPosition::new(seq, format!("digest-{}", seq)),
		})
	}

	fn page(events: Vec<ChainEvent>, has_more: bool) -> EventPage {
		let last_position = events.last().map(|e| e.position().clone());
		EventPage {
			events,
			last_position,
			has_more,
		}
	}

	/// Scripted source: one pair of pages per tick, keyed by stream.
	struct ScriptedSource {
		intent_pages: Mutex<VecDeque<EventPage>>,
		solution_pages: Mutex<VecDeque<EventPage>>,
	}

	impl ScriptedSource {
		fn new(intents: Vec<EventPage>, solutions: Vec<EventPage>) -> Arc<Self> {
			Arc::new(Self {
				intent_pages: Mutex::new(intents.into()),
				solution_pages: Mutex::new(solutions.into()),
			})
		}
	}

	#[async_trait::async_trait]
	impl EventSource for ScriptedSource {
		async fn query_events(
			&self,
			filter: &EventFilter,
			_after: Option<&EventCursor>,
			_limit: usize,
		) -> Result<EventPage> {
			let pages = if filter.event_type.contains("::intents::") {
				&self.intent_pages
			} else {
				&self.solution_pages
			};
			Ok(pages.lock().unwrap().pop_front().unwrap_or_default())
		}
	}

	/// Records handoff order; solutions settle through a spawned task.
	struct RecordingHandler {
		seen: Mutex<Vec<u64>>,
	}

	impl RecordingHandler {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				seen: Mutex::new(Vec::new()),
			})
		}
	}

	#[async_trait::async_trait]
	impl EventHandler for RecordingHandler {
		async fn handle_event(&self, event: ChainEvent) -> HandlerAck {
			self.seen.lock().unwrap().push(event.position().event_seq);
			match event {
				ChainEvent::IntentSubmitted(_) => HandlerAck::Completed,
				ChainEvent::SolutionSubmitted(_) => HandlerAck::Pending(tokio::spawn(async {
					tokio::time::sleep(Duration::from_millis(5)).await;
				})),
			}
		}
	}

	fn ingestor(
		source: Arc<dyn EventSource>,
		handler: Arc<dyn EventHandler>,
		cursor_store: Arc<dyn CursorStore>,
	) -> EventIngestor {
		EventIngestor::new(
			source,
			cursor_store,
			handler,
			IngestorConfig {
				package_id: "0xpkg".to_string(),
				..Default::default()
			},
		)
	}

	#[tokio::test]
	async fn test_tick_hands_events_in_ascending_order_across_streams() {
		let source = ScriptedSource::new(
			vec![page(vec![intent_event(1, "intent-1"), intent_event(4, "intent-2")], false)],
			vec![page(
				vec![
					solution_event(2, "intent-1", "sol-1"),
					solution_event(3, "intent-1", "sol-2"),
				],
				false,
			)],
		);
		let handler = RecordingHandler::new();
		let cursor_store = Arc::new(MemoryCursorStore::new());
		let ingestor = ingestor(source, handler.clone(), cursor_store.clone());

		ingestor.init().await.unwrap();
		ingestor.tick().await.unwrap();

		assert_eq!(*handler.seen.lock().unwrap(), vec![1, 2, 3, 4]);
		// Cursor persisted past the whole tick.
		assert_eq!(
			cursor_store.load().await.unwrap(),
			Some(EventPosition::new(4, "digest-4"))
		);
	}

	#[tokio::test]
	async fn test_batch_barrier_defers_events_past_truncated_stream() {
		// The intent stream hit its limit at seq 3; the solution at seq 5
		// must wait so next tick can interleave the unfetched intent events.
		let source = ScriptedSource::new(
			vec![
				page(vec![intent_event(1, "intent-1"), intent_event(3, "intent-2")], true),
				page(vec![intent_event(4, "intent-3")], false),
			],
			vec![
				page(vec![solution_event(5, "intent-1", "sol-1")], false),
				page(vec![solution_event(5, "intent-1", "sol-1")], false),
			],
		);
		let handler = RecordingHandler::new();
		let cursor_store = Arc::new(MemoryCursorStore::new());
		let ingestor = ingestor(source, handler.clone(), cursor_store.clone());

		ingestor.init().await.unwrap();
		ingestor.tick().await.unwrap();

		assert_eq!(*handler.seen.lock().unwrap(), vec![1, 3]);
		assert_eq!(
			cursor_store.load().await.unwrap(),
			Some(EventPosition::new(3, "digest-3"))
		);

		ingestor.tick().await.unwrap();
		assert_eq!(*handler.seen.lock().unwrap(), vec![1, 3, 4, 5]);
		assert_eq!(
			cursor_store.load().await.unwrap(),
			Some(EventPosition::new(5, "digest-5"))
		);
	}

	#[tokio::test]
	async fn test_cursor_is_monotonic_and_survives_empty_ticks() {
		let source = ScriptedSource::new(
			vec![page(vec![intent_event(7, "intent-1")], false)],
			vec![EventPage::default()],
		);
		let handler = RecordingHandler::new();
		let cursor_store = Arc::new(MemoryCursorStore::new());
		let ingestor = ingestor(source, handler, cursor_store.clone());

		ingestor.init().await.unwrap();
		ingestor.tick().await.unwrap();
		let first = cursor_store.load().await.unwrap();

		// Nothing new: the cursor must not move (and must not regress).
		ingestor.tick().await.unwrap();
		assert_eq!(cursor_store.load().await.unwrap(), first);
	}

	#[tokio::test]
	async fn test_failed_cursor_store_retries_next_tick() {
		struct FailingOnce {
			inner: MemoryCursorStore,
			fail_next: AtomicBool,
		}

		#[async_trait::async_trait]
		impl CursorStore for FailingOnce {
			async fn load(&self) -> Result<Option<EventCursor>> {
				self.inner.load().await
			}
			async fn store(&self, cursor: &EventCursor) -> Result<()> {
				if self.fail_next.swap(false, Ordering::SeqCst) {
					return Err(preranker_types::EngineError::transient("cursor", "disk full"));
				}
				self.inner.store(cursor).await
			}
		}

		let source = ScriptedSource::new(
			vec![page(vec![intent_event(1, "intent-1")], false)],
			vec![EventPage::default()],
		);
		let cursor_store = Arc::new(FailingOnce {
			inner: MemoryCursorStore::new(),
			fail_next: AtomicBool::new(true),
		});
		let ingestor = ingestor(source, RecordingHandler::new(), cursor_store.clone());

		ingestor.init().await.unwrap();
		ingestor.tick().await.unwrap();
		// Durable value still unset after the failed store.
		assert_eq!(cursor_store.inner.load().await.unwrap(), None);

		// Next tick re-persists the dirty in-memory cursor.
		ingestor.tick().await.unwrap();
		assert_eq!(
			cursor_store.inner.load().await.unwrap(),
			Some(EventPosition::new(1, "digest-1"))
		);
	}

	#[tokio::test]
	async fn test_dropped_tail_envelope_still_advances_cursor() {
		// The page reports a frontier past the last parseable event, as the
		// RPC source does when the tail envelope is malformed.
		let mut tail_dropped = page(vec![intent_event(1, "intent-1")], false);
		tail_dropped.last_position = Some(EventPosition::new(2, "digest-2"));

		let source = ScriptedSource::new(vec![tail_dropped], vec![EventPage::default()]);
		let cursor_store = Arc::new(MemoryCursorStore::new());
		let ingestor = ingestor(source, RecordingHandler::new(), cursor_store.clone());

		ingestor.init().await.unwrap();
		ingestor.tick().await.unwrap();

		assert_eq!(
			cursor_store.load().await.unwrap(),
			Some(EventPosition::new(2, "digest-2"))
		);
	}
}
