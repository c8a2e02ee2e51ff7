//! Solution data model: a candidate execution submitted by a solver.

use crate::common::{IntentId, SolutionId};
use crate::intent::AssetValue;
use serde::{Deserialize, Serialize};

/// A candidate execution for one intent, carrying the raw transaction to be
/// simulated plus the solver's declared routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
	#[serde(alias = "solutionId")]
	pub solution_id: SolutionId,
	#[serde(alias = "intentId")]
	pub intent_id: IntentId,
	#[serde(alias = "solverAddress")]
	pub solver_address: String,
	#[serde(alias = "submittedAtMs")]
	pub submitted_at_ms: u64,
	#[serde(alias = "transactionBytes", with = "tx_bytes")]
	pub transaction_bytes: Vec<u8>,
	#[serde(default)]
	pub route: Option<RouteSummary>,
}

/// Solver-declared pre-parse metadata about the solution's route. Fields the
/// solver omits cannot be checked before simulation; the corresponding
/// pre-simulation checks are skipped rather than failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSummary {
	#[serde(alias = "declaredInputs")]
	pub declared_inputs: Vec<AssetValue>,
	pub hops: Option<u32>,
	pub protocols: Vec<String>,
}

impl RouteSummary {
	/// Declared input amount for the given asset, if the solver declared one.
	pub fn declared_input_for(&self, asset_id: &str) -> Option<u128> {
		self.declared_inputs
			.iter()
			.find(|v| v.asset_id == asset_id)
			.map(|v| v.amount)
	}
}

/// Transaction payloads travel as base64 strings.
mod tx_bytes {
	use base64::{engine::general_purpose::STANDARD, Engine};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&STANDARD.encode(value))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let encoded = String::deserialize(deserializer)?;
		STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_solution_round_trips_transaction_bytes() {
		let solution = Solution {
			solution_id: "sol-1".into(),
			intent_id: "intent-1".into(),
			solver_address: "0xsolver".to_string(),
			submitted_at_ms: 1234,
			transaction_bytes: vec![1, 2, 3, 250],
			route: None,
		};

		let json = serde_json::to_string(&solution).unwrap();
		let back: Solution = serde_json::from_str(&json).unwrap();
		assert_eq!(back, solution);
	}

	#[test]
	fn test_solution_accepts_camel_case_payload() {
		let json = r#"{
			"solutionId": "sol-9",
			"intentId": "intent-9",
			"solverAddress": "0xsolver",
			"submittedAtMs": 99,
			"transactionBytes": "AQID",
			"route": {"declaredInputs": [{"assetId": "0xa::usdc::USDC", "amount": "7"}], "hops": 2, "protocols": ["0xdex"]}
		}"#;

		let solution: Solution = serde_json::from_str(json).unwrap();
		assert_eq!(solution.transaction_bytes, vec![1, 2, 3]);
		let route = solution.route.unwrap();
		assert_eq!(route.declared_input_for("0xa::usdc::USDC"), Some(7));
		assert_eq!(route.hops, Some(2));
	}
}
