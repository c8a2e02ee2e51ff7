//! JSON-RPC HTTP backend for the chain event source.

use crate::source::{EventFilter, EventPage, EventSource};
use crate::wire::RawEventPage;
use async_trait::async_trait;
use preranker_types::errors::{EngineError, Result};
use preranker_types::EventCursor;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RpcEventSourceConfig {
	pub endpoint: String,
	pub request_timeout: Duration,
}

impl Default for RpcEventSourceConfig {
	fn default() -> Self {
		Self {
			endpoint: "http://localhost:9000".to_string(),
			request_timeout: Duration::from_secs(5),
		}
	}
}

#[derive(Serialize)]
struct RpcRequest {
	jsonrpc: &'static str,
	id: u64,
	method: &'static str,
	params: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
	#[serde(default)]
	result: Option<RawEventPage>,
	#[serde(default)]
	error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

pub struct RpcEventSource {
	client: reqwest::Client,
	config: RpcEventSourceConfig,
	request_id: AtomicU64,
}

impl RpcEventSource {
	pub fn new(config: RpcEventSourceConfig) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(|e| EngineError::Config(format!("failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			config,
			request_id: AtomicU64::new(1),
		})
	}
}

#[async_trait]
impl EventSource for RpcEventSource {
	async fn query_events(
		&self,
		filter: &EventFilter,
		after: Option<&EventCursor>,
		limit: usize,
	) -> Result<EventPage> {
		let request = RpcRequest {
			jsonrpc: "2.0",
			id: self.request_id.fetch_add(1, Ordering::Relaxed),
			method: "px_queryEvents",
			params: vec![
				json!({ "event_type": filter.event_type }),
				serde_json::to_value(after)
					.map_err(|e| EngineError::Chain(format!("failed to encode cursor: {}", e)))?,
				json!(limit),
				json!("ascending"),
			],
		};

		let response = self
			.client
			.post(&self.config.endpoint)
			.json(&request)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					EngineError::Timeout("query_events")
				} else {
					EngineError::transient("query_events", e.to_string())
				}
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(EngineError::transient(
				"query_events",
				format!("event source returned status {}", status),
			));
		}

		let rpc: RpcResponse = response
			.json()
			.await
			.map_err(|e| EngineError::Chain(format!("malformed RPC response: {}", e)))?;

		if let Some(error) = rpc.error {
			return Err(EngineError::Chain(format!(
				"RPC error {}: {}",
				error.code, error.message
			)));
		}
		let raw = rpc
			.result
			.ok_or_else(|| EngineError::Chain("RPC response carried no result".to_string()))?;

		let mut page = EventPage {
			events: Vec::with_capacity(raw.data.len()),
			last_position: raw.next_cursor,
			has_more: raw.has_more,
		};

		for envelope in raw.data {
			let position = envelope.position();
			match envelope.into_chain_event() {
				Ok(event) => page.events.push(event),
				// Malformed events are terminal: log, drop, let the cursor
				// advance past them via last_position.
				Err(e) => warn!(position = %position, error = %e, "Dropping unparseable event"),
			}
			if page.last_position.as_ref().map_or(true, |last| *last < position) {
				page.last_position = Some(position);
			}
		}

		Ok(page)
	}
}
