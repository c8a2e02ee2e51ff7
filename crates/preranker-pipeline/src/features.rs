//! Best-effort enrichment of passing solutions for the ranking consumer.
//!
//! Everything here degrades gracefully: a missing or malformed source field
//! becomes a 0 or 1 default and is at most logged. Extraction is a pure
//! function of its inputs so replays produce identical records.

use preranker_types::common::{package_of, SYSTEM_PACKAGE};
use preranker_types::records::SolutionFeatures;
use preranker_types::{DryRun, Intent, Solution};
use std::collections::HashSet;
use tracing::trace;

const FEE_FIELDS: [&str; 4] = ["fee", "protocol_fee", "platform_fee", "fee_amount"];

pub fn extract_features(intent: &Intent, solution: &Solution, dry_run: &DryRun) -> SolutionFeatures {
	SolutionFeatures {
		gas_cost: dry_run.gas.computation,
		protocol_fees: protocol_fees(dry_run),
		surplus: surplus(intent, dry_run),
		total_hops: total_hops(solution, dry_run),
		protocols_count: protocols_count(solution, dry_run),
	}
}

/// Sum of fee-like fields across the structured event payloads.
fn protocol_fees(dry_run: &DryRun) -> u128 {
	let mut total: u128 = 0;
	for event in &dry_run.events {
		for field in FEE_FIELDS {
			if let Some(value) = event.payload.get(field) {
				match parse_amount(value) {
					Some(fee) => total = total.saturating_add(fee),
					None => {
						trace!(event_type = %event.event_type, field, "Unparseable fee field");
					}
				}
			}
		}
	}
	total
}

fn parse_amount(value: &serde_json::Value) -> Option<u128> {
	if let Some(n) = value.as_u64() {
		return Some(n as u128);
	}
	value.as_str()?.parse().ok()
}

/// Credited output above the declared floor for the primary output; zero
/// whenever either side is not resolvable.
fn surplus(intent: &Intent, dry_run: &DryRun) -> u128 {
	let Some(output) = intent.primary_output() else {
		return 0;
	};
	let Some(min_output) = intent.constraints.min_output_for(&output.asset_id) else {
		return 0;
	};
	let Some(actual) = dry_run.credited(&intent.user_address, &output.asset_id) else {
		return 0;
	};
	actual.saturating_sub(min_output)
}

/// Hop count. The solver's declared value is authoritative when present,
/// exactly as the pre-simulation routing checks treat it; otherwise it is
/// estimated from distinct non-system coin types minus one, merged with a
/// package-level estimate from the object changes. Never below 1.
fn total_hops(solution: &Solution, dry_run: &DryRun) -> u32 {
	if let Some(hops) = solution.route.as_ref().and_then(|route| route.hops) {
		return hops.max(1);
	}

	let coin_types: HashSet<&str> = dry_run
		.balance_changes
		.iter()
		.map(|change| change.coin_type.as_str())
		.filter(|coin_type| package_of(coin_type) != SYSTEM_PACKAGE)
		.collect();
	let coin_estimate = (coin_types.len() as u32).saturating_sub(1);

	let object_packages: HashSet<&str> = dry_run
		.object_changes
		.iter()
		.map(|change| package_of(&change.object_type))
		.filter(|package| *package != SYSTEM_PACKAGE)
		.collect();
	let object_estimate = object_packages.len() as u32;

	coin_estimate.max(object_estimate).max(1)
}

/// Count of distinct protocols. The solver's declared protocol list wins
/// when present; otherwise distinct non-system packages observed across
/// events and object changes.
fn protocols_count(solution: &Solution, dry_run: &DryRun) -> u32 {
	if let Some(route) = &solution.route {
		if !route.protocols.is_empty() {
			let declared: HashSet<&str> = route.protocols.iter().map(String::as_str).collect();
			return (declared.len() as u32).max(1);
		}
	}

	let mut packages: HashSet<&str> = HashSet::new();
	for event in &dry_run.events {
		packages.insert(package_of(&event.event_type));
	}
	for change in &dry_run.object_changes {
		packages.insert(package_of(&change.object_type));
	}
	packages.remove(SYSTEM_PACKAGE);
	(packages.len() as u32).max(1)
}
