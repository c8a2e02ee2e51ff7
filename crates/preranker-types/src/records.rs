//! Pass/fail records stored per solution and the flush payload handed to the
//! ranking consumer.

use crate::common::{IntentId, SolutionId};
use crate::intent::Intent;
use crate::simulation::DryRun;
use crate::solution::Solution;
use crate::validation::ValidationIssue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a solution was rejected by the pre-ranking pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
	FetchFailed,
	ConstraintValidationFailed,
	DryRunFailed,
	ComplexValidationFailed,
}

impl fmt::Display for FailReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			FailReason::FetchFailed => "fetch_failed",
			FailReason::ConstraintValidationFailed => "constraint_validation_failed",
			FailReason::DryRunFailed => "dry_run_failed",
			FailReason::ComplexValidationFailed => "complex_validation_failed",
		};
		write!(f, "{}", s)
	}
}

/// Best-effort enrichment computed for every passing solution. Missing or
/// malformed source data degrades to 0/1 defaults, never to a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionFeatures {
	#[serde(with = "crate::common::amount")]
	pub gas_cost: u128,
	#[serde(with = "crate::common::amount")]
	pub protocol_fees: u128,
	#[serde(with = "crate::common::amount")]
	pub surplus: u128,
	pub total_hops: u32,
	pub protocols_count: u32,
}

/// Record stored for a solution that cleared both validation phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassedRecord {
	pub solution_id: SolutionId,
	pub solution: Solution,
	pub features: SolutionFeatures,
	pub dry_run: DryRun,
}

/// Record stored for a rejected solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
	pub solution_id: SolutionId,
	pub reason: FailReason,
	#[serde(default)]
	pub errors: Vec<ValidationIssue>,
	#[serde(default)]
	pub detail: Option<String>,
}

/// Payload enqueued to the ranking consumer when a window closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushPayload {
	pub intent_id: IntentId,
	pub intent: Intent,
	pub passed_solutions: Vec<PassedRecord>,
	pub total_solutions_submitted: u64,
	pub window_closed_at: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_fail_reason_wire_form() {
		assert_eq!(
			serde_json::to_string(&FailReason::ConstraintValidationFailed).unwrap(),
			r#""constraint_validation_failed""#
		);
		assert_eq!(FailReason::DryRunFailed.to_string(), "dry_run_failed");
	}
}
