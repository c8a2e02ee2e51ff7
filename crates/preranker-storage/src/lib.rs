//! Keyed, TTL-capable state storage: the KV trait, its in-memory backend,
//! the durable event cursor and the typed per-intent record layer.

pub mod cursor;
pub mod implementations;
pub mod intent_store;
pub mod kv;

pub use cursor::{CursorStore, FileCursorStore, KvCursorStore, MemoryCursorStore};
pub use implementations::memory::MemoryKvStore;
pub use intent_store::{IntentStore, PutOutcome};
pub use kv::KvStore;

use preranker_types::errors::Result;
use std::sync::Arc;

/// Storage backend type.
#[derive(Debug, Clone)]
pub enum KvBackend {
	/// In-memory storage (lost on restart).
	Memory,
}

/// Create a KV store instance based on backend type.
pub fn create_kv_store(backend: KvBackend) -> Result<Arc<dyn KvStore>> {
	match backend {
		KvBackend::Memory => Ok(Arc::new(MemoryKvStore::new())),
	}
}
