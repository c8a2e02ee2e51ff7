//! Intent data model: the user-declared trading request and its constraints.

use crate::common::{amount, amount_opt, IntentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user-declared trading request with a bounded solver access window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
	#[serde(alias = "intentId")]
	pub intent_id: IntentId,
	#[serde(alias = "userAddress")]
	pub user_address: String,
	#[serde(alias = "windowStartMs")]
	pub window_start_ms: u64,
	#[serde(alias = "windowEndMs")]
	pub window_end_ms: u64,
	pub operation: Operation,
	#[serde(default)]
	pub constraints: Constraints,
}

impl Intent {
	/// The primary input of the operation, if any.
	pub fn primary_input(&self) -> Option<&AssetAmount> {
		self.operation.inputs.first()
	}

	/// The primary output of the operation, if any.
	pub fn primary_output(&self) -> Option<&AssetAmount> {
		self.operation.outputs.first()
	}
}

/// What the intent asks to be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
	pub mode: OperationMode,
	#[serde(default)]
	pub inputs: Vec<AssetAmount>,
	#[serde(default)]
	pub outputs: Vec<AssetAmount>,
	#[serde(alias = "expectedOutputs", default)]
	pub expected_outputs: Option<Vec<AssetValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
	Swap,
	Transfer,
	Custom,
}

/// An asset paired with an amount specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAmount {
	#[serde(alias = "assetId")]
	pub asset_id: String,
	pub amount: AmountSpec,
	#[serde(default)]
	pub decimals: Option<u32>,
}

/// Exact, bounded-range or everything-available amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountSpec {
	Exact(#[serde(with = "amount")] u128),
	Range {
		#[serde(with = "amount")]
		min: u128,
		#[serde(with = "amount")]
		max: u128,
	},
	All,
}

impl AmountSpec {
	/// The declared exact amount, if this spec carries one.
	pub fn exact(&self) -> Option<u128> {
		match self {
			AmountSpec::Exact(v) => Some(*v),
			_ => None,
		}
	}
}

/// An asset paired with a concrete amount (caps, floors and expectations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetValue {
	#[serde(alias = "assetId")]
	pub asset_id: String,
	#[serde(with = "amount")]
	pub amount: u128,
}

/// User-declared execution constraints. Every field is optional; an absent
/// field means the corresponding check is skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
	#[serde(alias = "deadlineMs")]
	pub deadline_ms: Option<u64>,
	#[serde(alias = "maxSlippageBps")]
	pub max_slippage_bps: Option<u32>,
	#[serde(alias = "minOutputs")]
	pub min_outputs: Option<Vec<AssetValue>>,
	#[serde(alias = "maxInputs")]
	pub max_inputs: Option<Vec<AssetValue>>,
	#[serde(alias = "maxGasCost", with = "amount_opt")]
	pub max_gas_cost: Option<u128>,
	pub routing: Option<RoutingConstraint>,
	#[serde(alias = "limitPrice")]
	pub limit_price: Option<LimitPrice>,
}

impl Constraints {
	/// Min-output floor declared for the given asset, if any.
	pub fn min_output_for(&self, asset_id: &str) -> Option<u128> {
		self.min_outputs
			.as_ref()?
			.iter()
			.find(|v| v.asset_id == asset_id)
			.map(|v| v.amount)
	}
}

/// Caps on how a solution may route through protocols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConstraint {
	#[serde(alias = "maxHops")]
	pub max_hops: Option<u32>,
	pub blacklist: Option<Vec<String>>,
	pub whitelist: Option<Vec<String>>,
}

/// A floor or ceiling on the realised execution price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitPrice {
	pub price: Decimal,
	pub comparison: PriceComparison,
	#[serde(alias = "priceAsset")]
	pub price_asset: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceComparison {
	Gte,
	Lte,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_intent_accepts_camel_case_payload() {
		let json = r#"{
			"intentId": "intent-1",
			"userAddress": "0xuser",
			"windowStartMs": 1000,
			"windowEndMs": 6000,
			"operation": {
				"mode": "swap",
				"inputs": [{"assetId": "0xa::usdc::USDC", "amount": {"exact": "100000"}, "decimals": 6}],
				"outputs": [{"assetId": "0xb::eth::ETH", "amount": "all"}],
				"expectedOutputs": [{"assetId": "0xb::eth::ETH", "amount": "50000"}]
			},
			"constraints": {
				"maxSlippageBps": 100,
				"minOutputs": [{"assetId": "0xb::eth::ETH", "amount": "49000"}]
			}
		}"#;

		let intent: Intent = serde_json::from_str(json).unwrap();
		assert_eq!(intent.intent_id.as_str(), "intent-1");
		assert_eq!(intent.window_end_ms, 6000);
		assert_eq!(
			intent.primary_input().unwrap().amount.exact(),
			Some(100_000)
		);
		assert_eq!(intent.constraints.max_slippage_bps, Some(100));
		assert_eq!(
			intent.constraints.min_output_for("0xb::eth::ETH"),
			Some(49_000)
		);
	}

	#[test]
	fn test_amount_spec_forms() {
		let exact: AmountSpec = serde_json::from_str(r#"{"exact": "10"}"#).unwrap();
		assert_eq!(exact, AmountSpec::Exact(10));

		let range: AmountSpec = serde_json::from_str(r#"{"range": {"min": "1", "max": "5"}}"#).unwrap();
		assert_eq!(range, AmountSpec::Range { min: 1, max: 5 });

		let all: AmountSpec = serde_json::from_str(r#""all""#).unwrap();
		assert_eq!(all, AmountSpec::All);
	}

	#[test]
	fn test_missing_constraints_default_to_empty() {
		let json = r#"{
			"intent_id": "intent-2",
			"user_address": "0xuser",
			"window_start_ms": 0,
			"window_end_ms": 1,
			"operation": {"mode": "transfer", "inputs": [], "outputs": []}
		}"#;

		let intent: Intent = serde_json::from_str(json).unwrap();
		assert_eq!(intent.constraints, Constraints::default());
	}
}
