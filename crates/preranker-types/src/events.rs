//! Typed chain events and the durable consumption cursor.

use crate::common::{IntentId, SolutionId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Total-ordered position of an event across both event streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPosition {
	#[serde(alias = "eventSeq")]
	pub event_seq: u64,
	#[serde(alias = "txDigest")]
	pub tx_digest: String,
}

impl EventPosition {
	pub fn new(event_seq: u64, tx_digest: impl Into<String>) -> Self {
		Self {
			event_seq,
			tx_digest: tx_digest.into(),
		}
	}
}

impl PartialOrd for EventPosition {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for EventPosition {
	fn cmp(&self, other: &Self) -> Ordering {
		self.event_seq
			.cmp(&other.event_seq)
			.then_with(|| self.tx_digest.cmp(&other.tx_digest))
	}
}

impl fmt::Display for EventPosition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.event_seq, self.tx_digest)
	}
}

/// The persisted position up to which both streams have been fully consumed.
pub type EventCursor = EventPosition;

/// An event emitted by the intent package, parsed at the ingestor boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainEvent {
	IntentSubmitted(IntentSubmittedEvent),
	SolutionSubmitted(SolutionSubmittedEvent),
}

impl ChainEvent {
	pub fn position(&self) -> &EventPosition {
		match self {
			ChainEvent::IntentSubmitted(e) => &e.position,
			ChainEvent::SolutionSubmitted(e) => &e.position,
		}
	}

	pub fn intent_id(&self) -> &IntentId {
		match self {
			ChainEvent::IntentSubmitted(e) => &e.intent_id,
			ChainEvent::SolutionSubmitted(e) => &e.intent_id,
		}
	}
}

/// A new intent opened its solver access window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSubmittedEvent {
	pub intent_id: IntentId,
	pub blob_id: String,
	pub window_end_ms: u64,
	pub position: EventPosition,
}

/// A solver submitted a candidate solution for an open intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSubmittedEvent {
	pub intent_id: IntentId,
	pub solution_id: SolutionId,
	pub blob_id: String,
	pub solver_address: String,
	pub submitted_at_ms: u64,
	pub position: EventPosition,
}
