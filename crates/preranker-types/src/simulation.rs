//! Dry-run result schema returned by the simulator.

use crate::common::{amount, signed_amount};
use serde::{Deserialize, Serialize};

/// Predicted effects of executing a solution's transaction without commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRun {
	pub status: DryRunStatus,
	#[serde(alias = "errorMsg", default)]
	pub error_msg: Option<String>,
	#[serde(default)]
	pub gas: GasSummary,
	#[serde(default)]
	pub events: Vec<SimEvent>,
	#[serde(alias = "balanceChanges", default)]
	pub balance_changes: Vec<BalanceChange>,
	#[serde(alias = "objectChanges", default)]
	pub object_changes: Vec<ObjectChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DryRunStatus {
	Ok,
	Fail,
}

impl DryRun {
	/// Total gas charged: computation + storage, net of the storage rebate.
	pub fn total_gas(&self) -> u128 {
		self.gas
			.computation
			.saturating_add(self.gas.storage)
			.saturating_sub(self.gas.rebate)
	}

	/// Sum of positive balance changes of `coin_type` credited to `owner`.
	/// `None` when no positive change for that pair exists at all.
	pub fn credited(&self, owner: &str, coin_type: &str) -> Option<u128> {
		let mut total: u128 = 0;
		let mut seen = false;
		for change in &self.balance_changes {
			if change.owner == owner && change.coin_type == coin_type && change.amount > 0 {
				total = total.saturating_add(change.amount as u128);
				seen = true;
			}
		}
		seen.then_some(total)
	}

	/// Absolute value of the net debit of `coin_type` charged to `owner`.
	pub fn debited(&self, owner: &str, coin_type: &str) -> Option<u128> {
		let mut total: i128 = 0;
		let mut seen = false;
		for change in &self.balance_changes {
			if change.owner == owner && change.coin_type == coin_type && change.amount < 0 {
				total = total.saturating_add(change.amount);
				seen = true;
			}
		}
		seen.then_some(total.unsigned_abs())
	}
}

/// Gas cost breakdown of a dry run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSummary {
	#[serde(with = "amount")]
	pub computation: u128,
	#[serde(with = "amount")]
	pub storage: u128,
	#[serde(with = "amount")]
	pub rebate: u128,
}

/// A structured event emitted during simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
	#[serde(alias = "eventType", alias = "type")]
	pub event_type: String,
	#[serde(alias = "parsedJson", default)]
	pub payload: serde_json::Value,
}

/// A signed balance delta predicted for one owner and coin type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChange {
	pub owner: String,
	#[serde(alias = "coinType")]
	pub coin_type: String,
	#[serde(with = "signed_amount")]
	pub amount: i128,
}

/// An object touched by the simulated transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectChange {
	#[serde(alias = "objectType")]
	pub object_type: String,
	#[serde(alias = "changeKind", default)]
	pub change_kind: String,
}
