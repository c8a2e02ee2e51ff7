//! Keyed state store trait.

use async_trait::async_trait;
use bytes::Bytes;
use preranker_types::errors::Result;
use std::time::Duration;

/// TTL-capable keyed store with value, set and list kinds per key.
///
/// The contract mirrors what the engine needs from an external store:
/// linearizable per key for a single caller, list operations returning every
/// successfully written record modulo TTL expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
	/// Store a raw value, optionally expiring after `ttl`.
	async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()>;

	/// Get a raw value.
	async fn get(&self, key: &str) -> Result<Option<Bytes>>;

	/// Whether the key currently exists (TTL considered).
	async fn exists(&self, key: &str) -> Result<bool>;

	/// Add a member to a set, creating it when absent. Returns true when the
	/// member was newly added.
	async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>) -> Result<bool>;

	/// All members of a set; empty when the key is absent.
	async fn set_members(&self, key: &str) -> Result<Vec<String>>;

	/// Cardinality of a set; zero when the key is absent.
	async fn set_card(&self, key: &str) -> Result<u64>;

	/// Append to a list, creating it when absent. Returns the new length.
	async fn list_push(&self, key: &str, value: Bytes) -> Result<u64>;

	/// All entries of a list in push order; empty when the key is absent.
	async fn list_range(&self, key: &str) -> Result<Vec<Bytes>>;

	/// Delete keys of any kind. Returns how many existed.
	async fn del(&self, keys: &[String]) -> Result<u64>;

	/// Remove expired entries. Returns how many were reaped.
	async fn cleanup(&self) -> Result<u64>;
}
