//! Typed per-intent record layer over the KV store.
//!
//! Keys are namespaced under the intent so the whole tree can be deleted in
//! one sweep. `(intent_id, solution_id)` is the primary key of a solution
//! record: the first write wins and replays are absorbed. Writes targeting a
//! deleted intent tree are silently discarded.

use crate::kv::KvStore;
use bytes::Bytes;
use preranker_types::errors::{EngineError, Result};
use preranker_types::records::{FailedRecord, PassedRecord};
use preranker_types::{Intent, IntentId, SolutionId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of a record write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
	/// The record is new and was written.
	Stored,
	/// A record already exists for this `(intent_id, solution_id)`.
	Duplicate,
	/// The intent tree no longer exists; the write was dropped.
	Discarded,
}

pub struct IntentStore {
	kv: Arc<dyn KvStore>,
	record_ttl: Duration,
	op_timeout: Duration,
}

impl IntentStore {
	pub fn new(kv: Arc<dyn KvStore>, record_ttl: Duration) -> Self {
		Self {
			kv,
			record_ttl,
			op_timeout: Duration::from_secs(1),
		}
	}

	/// Bound every store operation issued by a single call.
	pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
		self.op_timeout = op_timeout;
		self
	}

	async fn timed<T>(
		&self,
		operation: &'static str,
		fut: impl Future<Output = Result<T>>,
	) -> Result<T> {
		match tokio::time::timeout(self.op_timeout, fut).await {
			Ok(result) => result,
			Err(_) => Err(EngineError::Timeout(operation)),
		}
	}

	fn intent_key(intent_id: &IntentId) -> String {
		format!("intent:{}", intent_id)
	}

	fn passed_set_key(intent_id: &IntentId) -> String {
		format!("intent:{}:passed", intent_id)
	}

	fn failed_set_key(intent_id: &IntentId) -> String {
		format!("intent:{}:failed", intent_id)
	}

	fn passed_record_key(intent_id: &IntentId, solution_id: &SolutionId) -> String {
		format!("intent:{}:solution:{}:passed", intent_id, solution_id)
	}

	fn failed_record_key(intent_id: &IntentId, solution_id: &SolutionId) -> String {
		format!("intent:{}:solution:{}:failed", intent_id, solution_id)
	}

	fn encode<T: serde::Serialize>(value: &T) -> Result<Bytes> {
		serde_json::to_vec(value)
			.map(Bytes::from)
			.map_err(|e| EngineError::Storage(format!("failed to encode record: {}", e)))
	}

	pub async fn put_intent(&self, intent: &Intent) -> Result<()> {
		let key = Self::intent_key(&intent.intent_id);
		let value = Self::encode(intent)?;
		self.timed("put_intent", self.kv.set(&key, value, Some(self.record_ttl)))
			.await
	}

	pub async fn get_intent(&self, intent_id: &IntentId) -> Result<Option<Intent>> {
		let key = Self::intent_key(intent_id);
		match self.timed("get_intent", self.kv.get(&key)).await? {
			Some(bytes) => {
				let intent = serde_json::from_slice(&bytes).map_err(|e| {
					EngineError::Storage(format!("corrupt intent record {}: {}", intent_id, e))
				})?;
				Ok(Some(intent))
			}
			None => Ok(None),
		}
	}

	/// Whether a record of either outcome already exists for the pair.
	async fn record_exists(&self, intent_id: &IntentId, solution_id: &SolutionId) -> Result<bool> {
		Ok(self
			.kv
			.exists(&Self::passed_record_key(intent_id, solution_id))
			.await?
			|| self
				.kv
				.exists(&Self::failed_record_key(intent_id, solution_id))
				.await?)
	}

	pub async fn put_passed(&self, intent_id: &IntentId, record: &PassedRecord) -> Result<PutOutcome> {
		let value = Self::encode(record)?;
		self.timed("put_passed", async {
			if !self.kv.exists(&Self::intent_key(intent_id)).await? {
				debug!(intent_id = %intent_id, solution_id = %record.solution_id, "Discarding passed record for deleted intent tree");
				return Ok(PutOutcome::Discarded);
			}
			if self.record_exists(intent_id, &record.solution_id).await? {
				return Ok(PutOutcome::Duplicate);
			}

			self.kv
				.set(
					&Self::passed_record_key(intent_id, &record.solution_id),
					value,
					Some(self.record_ttl),
				)
				.await?;
			self.kv
				.set_add(
					&Self::passed_set_key(intent_id),
					record.solution_id.as_str(),
					Some(self.record_ttl),
				)
				.await?;
			Ok(PutOutcome::Stored)
		})
		.await
	}

	pub async fn put_failed(&self, intent_id: &IntentId, record: &FailedRecord) -> Result<PutOutcome> {
		let value = Self::encode(record)?;
		self.timed("put_failed", async {
			if !self.kv.exists(&Self::intent_key(intent_id)).await? {
				debug!(intent_id = %intent_id, solution_id = %record.solution_id, "Discarding failed record for deleted intent tree");
				return Ok(PutOutcome::Discarded);
			}
			if self.record_exists(intent_id, &record.solution_id).await? {
				return Ok(PutOutcome::Duplicate);
			}

			self.kv
				.set(
					&Self::failed_record_key(intent_id, &record.solution_id),
					value,
					Some(self.record_ttl),
				)
				.await?;
			self.kv
				.set_add(
					&Self::failed_set_key(intent_id),
					record.solution_id.as_str(),
					Some(self.record_ttl),
				)
				.await?;
			Ok(PutOutcome::Stored)
		})
		.await
	}

	/// All passed records currently retained for the intent. Members whose
	/// record already aged out are skipped.
	pub async fn list_passed(&self, intent_id: &IntentId) -> Result<Vec<PassedRecord>> {
		self.timed("list_passed", async {
			let members = self.kv.set_members(&Self::passed_set_key(intent_id)).await?;
			let mut records = Vec::with_capacity(members.len());
			for member in members {
				let key = Self::passed_record_key(intent_id, &SolutionId(member.clone()));
				match self.kv.get(&key).await? {
					Some(bytes) => {
						let record: PassedRecord = serde_json::from_slice(&bytes).map_err(|e| {
							EngineError::Storage(format!("corrupt passed record {}: {}", key, e))
						})?;
						records.push(record);
					}
					None => {
						debug!(intent_id = %intent_id, solution_id = %member, "Passed record expired before flush");
					}
				}
			}
			Ok(records)
		})
		.await
	}

	pub async fn count_passed(&self, intent_id: &IntentId) -> Result<u64> {
		let key = Self::passed_set_key(intent_id);
		self.timed("count_passed", self.kv.set_card(&key)).await
	}

	pub async fn count_failed(&self, intent_id: &IntentId) -> Result<u64> {
		let key = Self::failed_set_key(intent_id);
		self.timed("count_failed", self.kv.set_card(&key)).await
	}

	/// Remove the intent body, both outcome sets and every per-solution
	/// record in one pass.
	pub async fn delete_intent_tree(&self, intent_id: &IntentId) -> Result<()> {
		self.timed("delete_intent_tree", async {
			let passed = self.kv.set_members(&Self::passed_set_key(intent_id)).await?;
			let failed = self.kv.set_members(&Self::failed_set_key(intent_id)).await?;

			let mut keys = Vec::with_capacity(passed.len() + failed.len() + 3);
			keys.push(Self::intent_key(intent_id));
			keys.push(Self::passed_set_key(intent_id));
			keys.push(Self::failed_set_key(intent_id));
			for member in passed {
				keys.push(Self::passed_record_key(intent_id, &SolutionId(member)));
			}
			for member in failed {
				keys.push(Self::failed_record_key(intent_id, &SolutionId(member)));
			}

			self.kv.del(&keys).await?;
			Ok(())
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryKvStore;
	use preranker_types::records::{FailReason, SolutionFeatures};
	use preranker_types::{
		AmountSpec, AssetAmount, Constraints, DryRun, DryRunStatus, GasSummary, Operation,
		OperationMode, Solution,
	};

	fn store() -> IntentStore {
		IntentStore::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(3600))
	}

	fn test_intent(id: &str) -> Intent {
		Intent {
			intent_id: id.into(),
			user_address: "0xuser".to_string(),
			window_start_ms: 0,
			window_end_ms: 5000,
			operation: Operation {
				mode: OperationMode::Swap,
				inputs: vec![AssetAmount {
					asset_id: "0xa::usdc::USDC".to_string(),
					amount: AmountSpec::Exact(100_000),
					decimals: Some(6),
				}],
				outputs: vec![],
				expected_outputs: None,
			},
			constraints: Constraints::default(),
		}
	}

	fn passed_record(solution_id: &str) -> PassedRecord {
		PassedRecord {
			solution_id: solution_id.into(),
			solution: Solution {
				solution_id: solution_id.into(),
				intent_id: "intent-1".into(),
				solver_address: "0xsolver".to_string(),
				submitted_at_ms: 100,
				transaction_bytes: vec![0xAA],
				route: None,
			},
			features: SolutionFeatures::default(),
			dry_run: DryRun {
				status: DryRunStatus::Ok,
				error_msg: None,
				gas: GasSummary::default(),
				events: vec![],
				balance_changes: vec![],
				object_changes: vec![],
			},
		}
	}

	fn failed_record(solution_id: &str) -> FailedRecord {
		FailedRecord {
			solution_id: solution_id.into(),
			reason: FailReason::ConstraintValidationFailed,
			errors: vec![],
			detail: None,
		}
	}

	#[tokio::test]
	async fn test_intent_round_trip() {
		let store = store();
		let intent = test_intent("intent-1");

		store.put_intent(&intent).await.unwrap();
		assert_eq!(store.get_intent(&"intent-1".into()).await.unwrap(), Some(intent));
		assert_eq!(store.get_intent(&"missing".into()).await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_put_passed_is_first_write_wins() {
		let store = store();
		let id: IntentId = "intent-1".into();
		store.put_intent(&test_intent("intent-1")).await.unwrap();

		assert_eq!(
			store.put_passed(&id, &passed_record("sol-1")).await.unwrap(),
			PutOutcome::Stored
		);
		// Redelivery of the same event must not double-record.
		assert_eq!(
			store.put_passed(&id, &passed_record("sol-1")).await.unwrap(),
			PutOutcome::Duplicate
		);
		assert_eq!(store.count_passed(&id).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_pair_is_unique_across_outcomes() {
		let store = store();
		let id: IntentId = "intent-1".into();
		store.put_intent(&test_intent("intent-1")).await.unwrap();

		store.put_failed(&id, &failed_record("sol-1")).await.unwrap();
		assert_eq!(
			store.put_passed(&id, &passed_record("sol-1")).await.unwrap(),
			PutOutcome::Duplicate
		);
		assert_eq!(store.count_passed(&id).await.unwrap(), 0);
		assert_eq!(store.count_failed(&id).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_writes_to_deleted_tree_are_discarded() {
		let store = store();
		let id: IntentId = "intent-1".into();
		store.put_intent(&test_intent("intent-1")).await.unwrap();
		store.delete_intent_tree(&id).await.unwrap();

		assert_eq!(
			store.put_passed(&id, &passed_record("sol-late")).await.unwrap(),
			PutOutcome::Discarded
		);
		assert_eq!(store.count_passed(&id).await.unwrap(), 0);
		assert!(store.list_passed(&id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_intent_tree_removes_everything() {
		let store = store();
		let id: IntentId = "intent-1".into();
		store.put_intent(&test_intent("intent-1")).await.unwrap();
		store.put_passed(&id, &passed_record("sol-1")).await.unwrap();
		store.put_failed(&id, &failed_record("sol-2")).await.unwrap();

		store.delete_intent_tree(&id).await.unwrap();

		assert_eq!(store.get_intent(&id).await.unwrap(), None);
		assert_eq!(store.count_passed(&id).await.unwrap(), 0);
		assert_eq!(store.count_failed(&id).await.unwrap(), 0);
		assert!(store.list_passed(&id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_list_passed_returns_all_stored_records() {
		let store = store();
		let id: IntentId = "intent-1".into();
		store.put_intent(&test_intent("intent-1")).await.unwrap();
		store.put_passed(&id, &passed_record("sol-1")).await.unwrap();
		store.put_passed(&id, &passed_record("sol-2")).await.unwrap();

		let mut listed: Vec<String> = store
			.list_passed(&id)
			.await
			.unwrap()
			.into_iter()
			.map(|r| r.solution_id.0)
			.collect();
		listed.sort();
		assert_eq!(listed, vec!["sol-1".to_string(), "sol-2".to_string()]);
	}
}
