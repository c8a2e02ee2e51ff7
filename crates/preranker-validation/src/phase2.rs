//! Post-simulation constraint checks over the dry-run effects.

use crate::bps_ratio;
use preranker_types::{
	DryRun, Intent, LimitPrice, PriceComparison, ValidationReport,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

pub fn validate_post_simulation(intent: &Intent, dry_run: &DryRun) -> ValidationReport {
	let mut report = ValidationReport::new();

	check_min_outputs(&mut report, intent, dry_run);
	check_max_slippage(&mut report, intent, dry_run);
	check_max_gas(&mut report, intent, dry_run);
	check_limit_price(&mut report, intent, dry_run);

	report
}

fn check_min_outputs(report: &mut ValidationReport, intent: &Intent, dry_run: &DryRun) {
	let Some(floors) = &intent.constraints.min_outputs else {
		return;
	};

	for floor in floors {
		match dry_run.credited(&intent.user_address, &floor.asset_id) {
			Some(actual) if actual >= floor.amount => {}
			Some(actual) => {
				report.push_error(
					"constraints.min_outputs",
					format!(
						"credited {} of {} below minimum {}",
						actual, floor.asset_id, floor.amount
					),
				);
			}
			None => {
				report.push_error(
					"constraints.min_outputs",
					format!("no credited output of {} for the user", floor.asset_id),
				);
			}
		}
	}
}

fn check_max_slippage(report: &mut ValidationReport, intent: &Intent, dry_run: &DryRun) {
	let Some(max_bps) = intent.constraints.max_slippage_bps else {
		return;
	};
	let Some(expected_outputs) = &intent.operation.expected_outputs else {
		report.push_warning(
			"constraints.max_slippage_bps",
			"no expected outputs declared, slippage check skipped",
		);
		return;
	};

	for expected in expected_outputs {
		if expected.amount == 0 {
			continue;
		}
		let actual = dry_run
			.credited(&intent.user_address, &expected.asset_id)
			.unwrap_or(0);
		// Meeting or beating the expectation is never a slippage failure.
		if actual >= expected.amount {
			continue;
		}
		let slippage_bps = bps_ratio(expected.amount - actual, expected.amount);
		if slippage_bps > max_bps as u128 {
			report.push_error(
				"constraints.max_slippage_bps",
				format!(
					"slippage of {} bps on {} exceeds cap {} bps",
					slippage_bps, expected.asset_id, max_bps
				),
			);
		}
	}
}

fn check_max_gas(report: &mut ValidationReport, intent: &Intent, dry_run: &DryRun) {
	let Some(max_gas) = intent.constraints.max_gas_cost else {
		return;
	};

	let total_gas = dry_run.total_gas();
	if total_gas > max_gas {
		report.push_error(
			"constraints.max_gas_cost",
			format!("total gas {} exceeds cap {}", total_gas, max_gas),
		);
	}
}

/// Realised price from the primary input and its matching output, normalised
/// by declared decimals. When the price cannot be computed the check is
/// recorded as a warning and skipped.
fn check_limit_price(report: &mut ValidationReport, intent: &Intent, dry_run: &DryRun) {
	let Some(limit) = &intent.constraints.limit_price else {
		return;
	};

	let (Some(input), Some(output)) = (intent.primary_input(), intent.primary_output()) else {
		report.push_warning(
			"constraints.limit_price",
			"operation lacks a primary input/output pair",
		);
		return;
	};

	let input_amount = input
		.amount
		.exact()
		.or_else(|| dry_run.debited(&intent.user_address, &input.asset_id));
	let Some(input_amount) = input_amount else {
		report.push_warning(
			"constraints.limit_price",
			"input amount not determinable from declaration or balance changes",
		);
		return;
	};

	let Some(output_amount) = dry_run.credited(&intent.user_address, &output.asset_id) else {
		report.push_warning(
			"constraints.limit_price",
			format!("no credited output of {} to price against", output.asset_id),
		);
		return;
	};

	let (Some(in_norm), Some(out_norm)) = (
		normalise(input_amount, input.decimals),
		normalise(output_amount, output.decimals),
	) else {
		report.push_warning(
			"constraints.limit_price",
			"amounts out of normalisable range",
		);
		return;
	};
	if in_norm.is_zero() || out_norm.is_zero() {
		report.push_warning("constraints.limit_price", "zero-sized leg, price undefined");
		return;
	}

	let realised = if limit.price_asset == input.asset_id {
		in_norm / out_norm
	} else if limit.price_asset == output.asset_id {
		out_norm / in_norm
	} else {
		report.push_warning(
			"constraints.limit_price",
			format!(
				"price asset {} matches neither input nor output",
				limit.price_asset
			),
		);
		return;
	};

	if violates(limit, realised) {
		report.push_error(
			"constraints.limit_price",
			format!(
				"realised price {} violates {} limit {}",
				realised,
				match limit.comparison {
					PriceComparison::Gte => "gte",
					PriceComparison::Lte => "lte",
				},
				limit.price
			),
		);
	}
}

fn violates(limit: &LimitPrice, realised: Decimal) -> bool {
	match limit.comparison {
		PriceComparison::Gte => realised < limit.price,
		PriceComparison::Lte => realised > limit.price,
	}
}

fn normalise(amount: u128, decimals: Option<u32>) -> Option<Decimal> {
	let value = Decimal::from_u128(amount)?;
	let scale = 10u128.checked_pow(decimals.unwrap_or(0))?;
	let scale = Decimal::from_u128(scale)?;
	Some(value / scale)
}
