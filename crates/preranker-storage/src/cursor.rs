//! Durable persistence of the last-consumed event position.

use async_trait::async_trait;
use preranker_types::errors::{EngineError, Result};
use preranker_types::events::EventCursor;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Persists the ordered position up to which both event streams have been
/// fully consumed. `store` must be durable before the ingestor advances.
#[async_trait]
pub trait CursorStore: Send + Sync {
	async fn load(&self) -> Result<Option<EventCursor>>;
	async fn store(&self, cursor: &EventCursor) -> Result<()>;
}

/// File-backed cursor store. Writes go to a sibling temp file first and are
/// renamed into place so a crash mid-write leaves the previous durable value.
pub struct FileCursorStore {
	path: PathBuf,
}

impl FileCursorStore {
	pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await.map_err(|e| {
					EngineError::Storage(format!(
						"failed to create cursor directory {:?}: {}",
						parent, e
					))
				})?;
			}
		}
		Ok(Self { path })
	}
}

#[async_trait]
impl CursorStore for FileCursorStore {
	async fn load(&self) -> Result<Option<EventCursor>> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) => {
				let cursor: EventCursor = serde_json::from_slice(&bytes).map_err(|e| {
					EngineError::Storage(format!("corrupt cursor file {:?}: {}", self.path, e))
				})?;
				Ok(Some(cursor))
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(EngineError::Storage(format!(
				"failed to read cursor file {:?}: {}",
				self.path, e
			))),
		}
	}

	async fn store(&self, cursor: &EventCursor) -> Result<()> {
		let bytes = serde_json::to_vec(cursor)
			.map_err(|e| EngineError::Storage(format!("failed to encode cursor: {}", e)))?;

		let tmp = self.path.with_extension("tmp");
		tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
			EngineError::Storage(format!("failed to write cursor file {:?}: {}", tmp, e))
		})?;
		tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
			EngineError::Storage(format!(
				"failed to move cursor file into place {:?}: {}",
				self.path, e
			))
		})?;

		debug!(cursor = %cursor, "Persisted event cursor");
		Ok(())
	}
}

/// Cursor store over an untyped key in the KV backend, for deployments
/// whose keyed store is itself durable.
pub struct KvCursorStore {
	kv: std::sync::Arc<dyn crate::kv::KvStore>,
	key: String,
}

impl KvCursorStore {
	pub fn new(kv: std::sync::Arc<dyn crate::kv::KvStore>, key: impl Into<String>) -> Self {
		Self {
			kv,
			key: key.into(),
		}
	}
}

#[async_trait]
impl CursorStore for KvCursorStore {
	async fn load(&self) -> Result<Option<EventCursor>> {
		match self.kv.get(&self.key).await? {
			Some(bytes) => {
				let cursor = serde_json::from_slice(&bytes).map_err(|e| {
					EngineError::Storage(format!("corrupt cursor key {}: {}", self.key, e))
				})?;
				Ok(Some(cursor))
			}
			None => Ok(None),
		}
	}

	async fn store(&self, cursor: &EventCursor) -> Result<()> {
		let bytes = serde_json::to_vec(cursor)
			.map_err(|e| EngineError::Storage(format!("failed to encode cursor: {}", e)))?;
		self.kv.set(&self.key, bytes.into(), None).await
	}
}

/// In-memory cursor store for tests.
#[derive(Default)]
pub struct MemoryCursorStore {
	cursor: RwLock<Option<EventCursor>>,
}

impl MemoryCursorStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
	async fn load(&self) -> Result<Option<EventCursor>> {
		Ok(self.cursor.read().await.clone())
	}

	async fn store(&self, cursor: &EventCursor) -> Result<()> {
		*self.cursor.write().await = Some(cursor.clone());
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use preranker_types::events::EventPosition;

	#[tokio::test]
	async fn test_file_cursor_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cursor.json");
		let store = FileCursorStore::new(&path).await.unwrap();

		assert_eq!(store.load().await.unwrap(), None);

		let cursor = EventPosition::new(42, "digest-42");
		store.store(&cursor).await.unwrap();
		assert_eq!(store.load().await.unwrap(), Some(cursor.clone()));

		// A fresh instance over the same path sees the persisted value.
		let reopened = FileCursorStore::new(&path).await.unwrap();
		assert_eq!(reopened.load().await.unwrap(), Some(cursor));
	}

	#[tokio::test]
	async fn test_file_cursor_overwrite_keeps_latest() {
		let dir = tempfile::tempdir().unwrap();
		let store = FileCursorStore::new(dir.path().join("cursor.json"))
			.await
			.unwrap();

		store.store(&EventPosition::new(1, "a")).await.unwrap();
		store.store(&EventPosition::new(2, "b")).await.unwrap();

		assert_eq!(store.load().await.unwrap(), Some(EventPosition::new(2, "b")));
	}

	#[tokio::test]
	async fn test_kv_cursor_store_round_trip() {
		let kv = std::sync::Arc::new(crate::implementations::memory::MemoryKvStore::new());
		let store = KvCursorStore::new(kv, "events:cursor");

		assert_eq!(store.load().await.unwrap(), None);
		store.store(&EventPosition::new(9, "digest-9")).await.unwrap();
		assert_eq!(
			store.load().await.unwrap(),
			Some(EventPosition::new(9, "digest-9"))
		);
	}

	#[tokio::test]
	async fn test_corrupt_cursor_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cursor.json");
		tokio::fs::write(&path, b"not json").await.unwrap();

		let store = FileCursorStore::new(&path).await.unwrap();
		assert!(store.load().await.is_err());
	}
}
