//! In-memory KV backend used by the single-instance deployment and by tests.

use crate::kv::KvStore;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use preranker_types::errors::{EngineError, Result};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum StoredValue {
	Raw(Bytes),
	Set(HashSet<String>),
	List(Vec<Bytes>),
}

impl StoredValue {
	fn kind(&self) -> &'static str {
		match self {
			StoredValue::Raw(_) => "value",
			StoredValue::Set(_) => "set",
			StoredValue::List(_) => "list",
		}
	}
}

#[derive(Debug, Clone)]
struct Entry {
	value: StoredValue,
	expires_at: Option<Instant>,
}

impl Entry {
	fn expired(&self) -> bool {
		self.expires_at.is_some_and(|at| at <= Instant::now())
	}
}

/// DashMap-backed store with lazy expiry on access plus an explicit sweep.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
	entries: DashMap<String, Entry>,
}

impl MemoryKvStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drop the entry when expired, returning whether a live entry remains.
	fn prune(&self, key: &str) -> bool {
		if let Some(entry) = self.entries.get(key) {
			if entry.expired() {
				drop(entry);
				self.entries.remove(key);
				return false;
			}
			return true;
		}
		false
	}

	fn wrong_kind(key: &str, expected: &str, actual: &str) -> EngineError {
		EngineError::Storage(format!(
			"key {} holds a {} but a {} operation was issued",
			key, actual, expected
		))
	}
}

#[async_trait]
impl KvStore for MemoryKvStore {
	async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
		self.entries.insert(
			key.to_string(),
			Entry {
				value: StoredValue::Raw(value),
				expires_at: ttl.map(|t| Instant::now() + t),
			},
		);
		Ok(())
	}

	async fn get(&self, key: &str) -> Result<Option<Bytes>> {
		if !self.prune(key) {
			return Ok(None);
		}
		match self.entries.get(key) {
			Some(entry) => match &entry.value {
				StoredValue::Raw(bytes) => Ok(Some(bytes.clone())),
				other => Err(Self::wrong_kind(key, "value", other.kind())),
			},
			None => Ok(None),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool> {
		Ok(self.prune(key))
	}

	async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>) -> Result<bool> {
		self.prune(key);
		let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
			value: StoredValue::Set(HashSet::new()),
			expires_at: ttl.map(|t| Instant::now() + t),
		});
		match &mut entry.value {
			StoredValue::Set(members) => Ok(members.insert(member.to_string())),
			other => Err(Self::wrong_kind(key, "set", other.kind())),
		}
	}

	async fn set_members(&self, key: &str) -> Result<Vec<String>> {
		if !self.prune(key) {
			return Ok(Vec::new());
		}
		match self.entries.get(key) {
			Some(entry) => match &entry.value {
				StoredValue::Set(members) => Ok(members.iter().cloned().collect()),
				other => Err(Self::wrong_kind(key, "set", other.kind())),
			},
			None => Ok(Vec::new()),
		}
	}

	async fn set_card(&self, key: &str) -> Result<u64> {
		if !self.prune(key) {
			return Ok(0);
		}
		match self.entries.get(key) {
			Some(entry) => match &entry.value {
				StoredValue::Set(members) => Ok(members.len() as u64),
				other => Err(Self::wrong_kind(key, "set", other.kind())),
			},
			None => Ok(0),
		}
	}

	async fn list_push(&self, key: &str, value: Bytes) -> Result<u64> {
		self.prune(key);
		let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
			value: StoredValue::List(Vec::new()),
			expires_at: None,
		});
		match &mut entry.value {
			StoredValue::List(items) => {
				items.push(value);
				Ok(items.len() as u64)
			}
			other => Err(Self::wrong_kind(key, "list", other.kind())),
		}
	}

	async fn list_range(&self, key: &str) -> Result<Vec<Bytes>> {
		if !self.prune(key) {
			return Ok(Vec::new());
		}
		match self.entries.get(key) {
			Some(entry) => match &entry.value {
				StoredValue::List(items) => Ok(items.clone()),
				other => Err(Self::wrong_kind(key, "list", other.kind())),
			},
			None => Ok(Vec::new()),
		}
	}

	async fn del(&self, keys: &[String]) -> Result<u64> {
		let mut removed = 0;
		for key in keys {
			if self.entries.remove(key).is_some() {
				removed += 1;
			}
		}
		Ok(removed)
	}

	async fn cleanup(&self) -> Result<u64> {
		let expired: Vec<String> = self
			.entries
			.iter()
			.filter(|entry| entry.value().expired())
			.map(|entry| entry.key().clone())
			.collect();
		let count = expired.len() as u64;
		for key in expired {
			self.entries.remove(&key);
		}
		Ok(count)
	}
}
