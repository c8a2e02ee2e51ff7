//! Per-solution orchestration.

use crate::features::extract_features;
use preranker_blob::BlobFetcher;
use preranker_simulation::SimulatorClient;
use preranker_types::records::{FailReason, FailedRecord, PassedRecord};
use preranker_types::{DryRunStatus, Intent, SolutionSubmittedEvent};
use preranker_validation::{validate_post_simulation, validate_pre_simulation};
use std::sync::Arc;
use tracing::{debug, info};

/// Terminal result of one pipeline invocation. The pipeline never errors out
/// to its caller; every path ends in a pass or fail record.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
	Passed(PassedRecord),
	Failed(FailedRecord),
}

impl PipelineOutcome {
	pub fn is_passed(&self) -> bool {
		matches!(self, PipelineOutcome::Passed(_))
	}
}

pub struct SolutionPipeline {
	blob: Arc<dyn BlobFetcher>,
	simulator: Arc<dyn SimulatorClient>,
}

impl SolutionPipeline {
	pub fn new(blob: Arc<dyn BlobFetcher>, simulator: Arc<dyn SimulatorClient>) -> Self {
		Self { blob, simulator }
	}

	pub async fn process(&self, intent: &Intent, event: &SolutionSubmittedEvent) -> PipelineOutcome {
		let solution_id = event.solution_id.clone();

		// 1. Fetch the solution payload.
		let solution = match self.blob.fetch_solution(&event.blob_id).await {
			Ok(solution) => solution,
			Err(e) => {
				debug!(solution_id = %solution_id, error = %e, "Solution blob fetch failed");
				return PipelineOutcome::Failed(FailedRecord {
					solution_id,
					reason: FailReason::FetchFailed,
					errors: vec![],
					detail: Some(e.to_string()),
				});
			}
		};

		// 2. Cheap pre-simulation checks.
		let report =
			validate_pre_simulation(intent, &solution, event.submitted_at_ms, intent.window_end_ms);
		if !report.ok() {
			debug!(
				solution_id = %solution_id,
				issues = report.issues.len(),
				"Solution rejected before simulation"
			);
			return PipelineOutcome::Failed(FailedRecord {
				solution_id,
				reason: FailReason::ConstraintValidationFailed,
				errors: report.issues,
				detail: None,
			});
		}

		// 3. Simulate.
		let dry_run = match self.simulator.dry_run(&solution.transaction_bytes).await {
			Ok(dry_run) => dry_run,
			Err(e) => {
				return PipelineOutcome::Failed(FailedRecord {
					solution_id,
					reason: FailReason::DryRunFailed,
					errors: vec![],
					detail: Some(e.to_string()),
				});
			}
		};
		if dry_run.status == DryRunStatus::Fail {
			return PipelineOutcome::Failed(FailedRecord {
				solution_id,
				reason: FailReason::DryRunFailed,
				errors: vec![],
				detail: dry_run.error_msg,
			});
		}

		// 4. Result-dependent checks.
		let report = validate_post_simulation(intent, &dry_run);
		if !report.ok() {
			debug!(
				solution_id = %solution_id,
				issues = report.issues.len(),
				"Solution rejected after simulation"
			);
			return PipelineOutcome::Failed(FailedRecord {
				solution_id,
				reason: FailReason::ComplexValidationFailed,
				errors: report.issues,
				detail: None,
			});
		}

		// 5. Enrich and pass.
		let features = extract_features(intent, &solution, &dry_run);
		info!(
			intent_id = %intent.intent_id,
			solution_id = %solution_id,
			gas = features.gas_cost,
			"Solution passed pre-ranking"
		);
		PipelineOutcome::Passed(PassedRecord {
			solution_id,
			solution,
			features,
			dry_run,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use preranker_types::errors::{EngineError, Result};
	use preranker_types::{
		AmountSpec, AssetAmount, AssetValue, BalanceChange, Constraints, DryRun, EventPosition,
		GasSummary, Operation, OperationMode, Solution,
	};
	use std::sync::atomic::{AtomicUsize, Ordering};

	const USDC: &str = "0xa::usdc::USDC";
	const USER: &str = "0xuser";

	struct StaticBlobs {
		solution: Option<Solution>,
	}

	#[async_trait]
	impl BlobFetcher for StaticBlobs {
		async fn fetch_intent(&self, blob_id: &str) -> Result<Intent> {
			Err(EngineError::BlobNotFound(blob_id.to_string()))
		}

		async fn fetch_solution(&self, blob_id: &str) -> Result<Solution> {
			self.solution
				.clone()
				.ok_or_else(|| EngineError::BlobNotFound(blob_id.to_string()))
		}
	}

	struct CountingSimulator {
		result: Result<DryRun>,
		calls: AtomicUsize,
	}

	impl CountingSimulator {
		fn returning(result: Result<DryRun>) -> Arc<Self> {
			Arc::new(Self {
				result,
				calls: AtomicUsize::new(0),
			})
		}
	}

	#[async_trait]
	impl SimulatorClient for CountingSimulator {
		async fn dry_run(&self, _transaction_bytes: &[u8]) -> Result<DryRun> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			match &self.result {
				Ok(dry_run) => Ok(dry_run.clone()),
				Err(_) => Err(EngineError::transient("dry_run", "unreachable")),
			}
		}
	}

	fn test_intent() -> Intent {
		Intent {
			intent_id: "intent-1".into(),
			user_address: USER.to_string(),
			window_start_ms: 0,
			window_end_ms: 5000,
			operation: Operation {
				mode: OperationMode::Swap,
				inputs: vec![AssetAmount {
					asset_id: "0xb::eth::ETH".to_string(),
					amount: AmountSpec::Exact(1_000_000_000),
					decimals: Some(9),
				}],
				outputs: vec![AssetAmount {
					asset_id: USDC.to_string(),
					amount: AmountSpec::All,
					decimals: Some(6),
				}],
				expected_outputs: Some(vec![AssetValue {
					asset_id: USDC.to_string(),
					amount: 100_000,
				}]),
			},
			constraints: Constraints {
				max_slippage_bps: Some(100),
				min_outputs: Some(vec![AssetValue {
					asset_id: USDC.to_string(),
					amount: 100_000,
				}]),
				..Default::default()
			},
		}
	}

	fn test_solution() -> Solution {
		Solution {
			solution_id: "sol-1".into(),
			intent_id: "intent-1".into(),
			solver_address: "0xsolver".to_string(),
			submitted_at_ms: 1000,
			transaction_bytes: vec![7; 16],
			route: None,
		}
	}

	fn solution_event(submitted_at_ms: u64) -> SolutionSubmittedEvent {
		SolutionSubmittedEvent {
			intent_id: "intent-1".into(),
			solution_id: "sol-1".into(),
			blob_id: "blob-sol-1".to_string(),
			solver_address: "0xsolver".to_string(),
			submitted_at_ms,
			position: EventPosition::new(1, "digest"),
		}
	}

	fn crediting_dry_run(amount: i128, computation: u128) -> DryRun {
		DryRun {
			status: preranker_types::DryRunStatus::Ok,
			error_msg: None,
			gas: GasSummary {
				computation,
				storage: 0,
				rebate: 0,
			},
			events: vec![],
			balance_changes: vec![BalanceChange {
				owner: USER.to_string(),
				coin_type: USDC.to_string(),
				amount,
			}],
			object_changes: vec![],
		}
	}

	fn failing_dry_run(msg: &str) -> DryRun {
		DryRun {
			status: preranker_types::DryRunStatus::Fail,
			error_msg: Some(msg.to_string()),
			gas: GasSummary::default(),
			events: vec![],
			balance_changes: vec![],
			object_changes: vec![],
		}
	}

	#[tokio::test]
	async fn test_happy_path_produces_passed_record() {
		let blob = Arc::new(StaticBlobs {
			solution: Some(test_solution()),
		});
		let simulator = CountingSimulator::returning(Ok(crediting_dry_run(101_000, 1000)));
		let pipeline = SolutionPipeline::new(blob, simulator.clone());

		let outcome = pipeline.process(&test_intent(), &solution_event(1000)).await;

		match outcome {
			PipelineOutcome::Passed(record) => {
				assert_eq!(record.solution_id.as_str(), "sol-1");
				assert_eq!(record.features.gas_cost, 1000);
				assert_eq!(record.features.surplus, 1000);
			}
			PipelineOutcome::Failed(record) => panic!("expected pass, got {:?}", record.reason),
		}
		assert_eq!(simulator.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_fetch_failure_is_terminal() {
		let blob = Arc::new(StaticBlobs { solution: None });
		let simulator = CountingSimulator::returning(Ok(crediting_dry_run(101_000, 1000)));
		let pipeline = SolutionPipeline::new(blob, simulator.clone());

		let outcome = pipeline.process(&test_intent(), &solution_event(1000)).await;

		match outcome {
			PipelineOutcome::Failed(record) => {
				assert_eq!(record.reason, FailReason::FetchFailed);
				assert!(record.detail.is_some());
			}
			PipelineOutcome::Passed(_) => panic!("expected failure"),
		}
		assert_eq!(simulator.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_phase1_failure_skips_simulation() {
		let blob = Arc::new(StaticBlobs {
			solution: Some(test_solution()),
		});
		let simulator = CountingSimulator::returning(Ok(crediting_dry_run(101_000, 1000)));
		let pipeline = SolutionPipeline::new(blob, simulator.clone());

		// Submitted past the window end: deadline check fails in phase 1.
		let outcome = pipeline.process(&test_intent(), &solution_event(6000)).await;

		match outcome {
			PipelineOutcome::Failed(record) => {
				assert_eq!(record.reason, FailReason::ConstraintValidationFailed);
				assert_eq!(record.errors[0].field, "constraints.deadline_ms");
			}
			PipelineOutcome::Passed(_) => panic!("expected failure"),
		}
		assert_eq!(
			simulator.calls.load(Ordering::SeqCst),
			0,
			"simulator must not run after a phase-1 failure"
		);
	}

	#[tokio::test]
	async fn test_simulator_reported_failure() {
		let blob = Arc::new(StaticBlobs {
			solution: Some(test_solution()),
		});
		let simulator = CountingSimulator::returning(Ok(failing_dry_run("abort in pool::swap")));
		let pipeline = SolutionPipeline::new(blob, simulator);

		let outcome = pipeline.process(&test_intent(), &solution_event(1000)).await;

		match outcome {
			PipelineOutcome::Failed(record) => {
				assert_eq!(record.reason, FailReason::DryRunFailed);
				assert_eq!(record.detail.as_deref(), Some("abort in pool::swap"));
			}
			PipelineOutcome::Passed(_) => panic!("expected failure"),
		}
	}

	#[tokio::test]
	async fn test_simulator_transport_failure() {
		let blob = Arc::new(StaticBlobs {
			solution: Some(test_solution()),
		});
		let simulator =
			CountingSimulator::returning(Err(EngineError::transient("dry_run", "unreachable")));
		let pipeline = SolutionPipeline::new(blob, simulator);

		let outcome = pipeline.process(&test_intent(), &solution_event(1000)).await;

		match outcome {
			PipelineOutcome::Failed(record) => assert_eq!(record.reason, FailReason::DryRunFailed),
			PipelineOutcome::Passed(_) => panic!("expected failure"),
		}
	}

	#[tokio::test]
	async fn test_phase2_failure_after_simulation() {
		let blob = Arc::new(StaticBlobs {
			solution: Some(test_solution()),
		});
		// 500 bps slippage against a 100 bps cap, and below the min output.
		let simulator = CountingSimulator::returning(Ok(crediting_dry_run(95_000, 1000)));
		let pipeline = SolutionPipeline::new(blob, simulator.clone());

		let outcome = pipeline.process(&test_intent(), &solution_event(1000)).await;

		match outcome {
			PipelineOutcome::Failed(record) => {
				assert_eq!(record.reason, FailReason::ComplexValidationFailed);
				assert!(!record.errors.is_empty());
			}
			PipelineOutcome::Passed(_) => panic!("expected failure"),
		}
		assert_eq!(simulator.calls.load(Ordering::SeqCst), 1);
	}
}
