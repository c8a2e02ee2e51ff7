//! Content-addressed retrieval of intent and solution payloads.

pub mod implementations;

pub use implementations::http::{HttpBlobFetcher, HttpBlobFetcherConfig};

use async_trait::async_trait;
use preranker_types::errors::Result;
use preranker_types::{Intent, Solution};

/// Fetches and decodes blob payloads by content address.
///
/// Errors are split three ways: not-found and corrupt payloads are terminal
/// for the event that referenced them, transient transport failures are
/// retried inside the implementation with bounded back-off and only surface
/// once the retry budget is exhausted.
#[async_trait]
pub trait BlobFetcher: Send + Sync {
	async fn fetch_intent(&self, blob_id: &str) -> Result<Intent>;
	async fn fetch_solution(&self, blob_id: &str) -> Result<Solution>;
}
