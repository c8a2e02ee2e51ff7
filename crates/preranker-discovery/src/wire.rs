//! Wire-form event records. Field names arrive in either snake_case or
//! camelCase depending on the serving node; both are accepted here and
//! nowhere else, past this boundary everything is typed.

use preranker_types::errors::{EngineError, Result};
use preranker_types::{
	ChainEvent, EventPosition, IntentId, IntentSubmittedEvent, SolutionId,
	SolutionSubmittedEvent,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RawEventPage {
	#[serde(default)]
	pub data: Vec<RawEventEnvelope>,
	#[serde(alias = "nextCursor", default)]
	pub next_cursor: Option<EventPosition>,
	#[serde(alias = "hasMore", default)]
	pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawEventEnvelope {
	#[serde(alias = "eventSeq")]
	pub event_seq: u64,
	#[serde(alias = "txDigest")]
	pub tx_digest: String,
	#[serde(alias = "eventType", alias = "type")]
	pub event_type: String,
	#[serde(alias = "parsedJson", default)]
	pub parsed_json: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentSubmittedPayload {
	#[serde(alias = "intentId")]
	intent_id: IntentId,
	#[serde(alias = "blobId")]
	blob_id: String,
	#[serde(alias = "windowEndMs")]
	window_end_ms: u64,
}

#[derive(Debug, Deserialize)]
struct SolutionSubmittedPayload {
	#[serde(alias = "intentId")]
	intent_id: IntentId,
	#[serde(alias = "solutionId")]
	solution_id: SolutionId,
	#[serde(alias = "blobId")]
	blob_id: String,
	#[serde(alias = "solverAddress")]
	solver_address: String,
	#[serde(alias = "submittedAtMs")]
	submitted_at_ms: u64,
}

impl RawEventEnvelope {
	pub fn position(&self) -> EventPosition {
		EventPosition::new(self.event_seq, self.tx_digest.clone())
	}

	/// Convert into a typed event based on the qualified event type.
	pub fn into_chain_event(self) -> Result<ChainEvent> {
		let position = self.position();

		if self.event_type.ends_with("::intents::IntentSubmitted") {
			let payload: IntentSubmittedPayload =
				serde_json::from_value(self.parsed_json).map_err(|e| {
					EngineError::Chain(format!("malformed IntentSubmitted payload: {}", e))
				})?;
			Ok(ChainEvent::IntentSubmitted(IntentSubmittedEvent {
				intent_id: payload.intent_id,
				blob_id: payload.blob_id,
				window_end_ms: payload.window_end_ms,
				position,
			}))
		} else if self.event_type.ends_with("::solutions::SolutionSubmitted") {
			let payload: SolutionSubmittedPayload =
				serde_json::from_value(self.parsed_json).map_err(|e| {
					EngineError::Chain(format!("malformed SolutionSubmitted payload: {}", e))
				})?;
			Ok(ChainEvent::SolutionSubmitted(SolutionSubmittedEvent {
				intent_id: payload.intent_id,
				solution_id: payload.solution_id,
				blob_id: payload.blob_id,
				solver_address: payload.solver_address,
				submitted_at_ms: payload.submitted_at_ms,
				position,
			}))
		} else {
			Err(EngineError::Chain(format!(
				"unrecognised event type {}",
				self.event_type
			)))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_intent_event_snake_case() {
		let envelope: RawEventEnvelope = serde_json::from_str(
			r#"{
				"event_seq": 10,
				"tx_digest": "digest-10",
				"event_type": "0xpkg::intents::IntentSubmitted",
				"parsed_json": {"intent_id": "intent-1", "blob_id": "blob-1", "window_end_ms": 5000}
			}"#,
		)
		.unwrap();

		match envelope.into_chain_event().unwrap() {
			ChainEvent::IntentSubmitted(event) => {
				assert_eq!(event.intent_id.as_str(), "intent-1");
				assert_eq!(event.blob_id, "blob-1");
				assert_eq!(event.window_end_ms, 5000);
				assert_eq!(event.position, EventPosition::new(10, "digest-10"));
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_solution_event_camel_case() {
		let envelope: RawEventEnvelope = serde_json::from_str(
			r#"{
				"eventSeq": 11,
				"txDigest": "digest-11",
				"eventType": "0xpkg::solutions::SolutionSubmitted",
				"parsedJson": {
					"intentId": "intent-1",
					"solutionId": "sol-1",
					"blobId": "blob-2",
					"solverAddress": "0xsolver",
					"submittedAtMs": 1500
				}
			}"#,
		)
		.unwrap();

		match envelope.into_chain_event().unwrap() {
			ChainEvent::SolutionSubmitted(event) => {
				assert_eq!(event.solution_id.as_str(), "sol-1");
				assert_eq!(event.solver_address, "0xsolver");
				assert_eq!(event.submitted_at_ms, 1500);
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_unknown_event_type_is_rejected() {
		let envelope = RawEventEnvelope {
			event_seq: 1,
			tx_digest: "d".to_string(),
			event_type: "0xpkg::other::Something".to_string(),
			parsed_json: serde_json::Value::Null,
		};
		assert!(envelope.into_chain_event().is_err());
	}

	#[test]
	fn test_malformed_payload_is_rejected() {
		let envelope = RawEventEnvelope {
			event_seq: 1,
			tx_digest: "d".to_string(),
			event_type: "0xpkg::intents::IntentSubmitted".to_string(),
			parsed_json: serde_json::json!({"intent_id": "x"}),
		};
		assert!(envelope.into_chain_event().is_err());
	}
}
