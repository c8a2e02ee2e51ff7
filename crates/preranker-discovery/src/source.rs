//! Chain event source trait.

use async_trait::async_trait;
use preranker_types::errors::Result;
use preranker_types::{ChainEvent, EventCursor, EventPosition};

/// Filter for one event stream, e.g. `<package>::intents::IntentSubmitted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
	pub event_type: String,
}

impl EventFilter {
	pub fn intent_submitted(package_id: &str) -> Self {
		Self {
			event_type: format!("{}::intents::IntentSubmitted", package_id),
		}
	}

	pub fn solution_submitted(package_id: &str) -> Self {
		Self {
			event_type: format!("{}::solutions::SolutionSubmitted", package_id),
		}
	}
}

/// One bounded, ascending query result.
#[derive(Debug, Default)]
pub struct EventPage {
	/// Parsed events in ascending position order. Envelopes that failed to
	/// parse are logged and dropped by the source; `last_position` still
	/// accounts for them so the cursor can advance past.
	pub events: Vec<ChainEvent>,
	/// Position of the last envelope the query returned, parsed or not.
	pub last_position: Option<EventPosition>,
	/// Whether more events exist beyond `last_position`.
	pub has_more: bool,
}

/// Bounded ascending event queries against the chain.
#[async_trait]
pub trait EventSource: Send + Sync {
	async fn query_events(
		&self,
		filter: &EventFilter,
		after: Option<&EventCursor>,
		limit: usize,
	) -> Result<EventPage>;
}
