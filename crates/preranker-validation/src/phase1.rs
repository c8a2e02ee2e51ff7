//! Pre-simulation constraint checks.
//!
//! Inputs are the intent, the solution as submitted and the window clock.
//! Routing and input-cap checks read the solver's declared route metadata;
//! when the solution does not declare a field the check is skipped and the
//! post-simulation phase is relied on instead.

use preranker_types::{Intent, Solution, ValidationReport};

pub fn validate_pre_simulation(
	intent: &Intent,
	solution: &Solution,
	submitted_at_ms: u64,
	window_end_ms: u64,
) -> ValidationReport {
	let mut report = ValidationReport::new();

	check_deadline(&mut report, submitted_at_ms, window_end_ms);
	check_max_inputs(&mut report, intent, solution);
	check_routing(&mut report, intent, solution);

	report
}

fn check_deadline(report: &mut ValidationReport, submitted_at_ms: u64, window_end_ms: u64) {
	if submitted_at_ms > window_end_ms {
		report.push_error(
			"constraints.deadline_ms",
			format!(
				"solution submitted at {} after window end {}",
				submitted_at_ms, window_end_ms
			),
		);
	}
}

fn check_max_inputs(report: &mut ValidationReport, intent: &Intent, solution: &Solution) {
	let Some(caps) = &intent.constraints.max_inputs else {
		return;
	};
	let Some(route) = &solution.route else {
		return;
	};

	for cap in caps {
		if let Some(declared) = route.declared_input_for(&cap.asset_id) {
			if declared > cap.amount {
				report.push_error(
					"constraints.max_inputs",
					format!(
						"input of {} for {} exceeds cap {}",
						declared, cap.asset_id, cap.amount
					),
				);
			}
		}
	}
}

fn check_routing(report: &mut ValidationReport, intent: &Intent, solution: &Solution) {
	let Some(routing) = &intent.constraints.routing else {
		return;
	};
	let Some(route) = &solution.route else {
		return;
	};

	if let (Some(max_hops), Some(hops)) = (routing.max_hops, route.hops) {
		if hops > max_hops {
			report.push_error(
				"constraints.routing.max_hops",
				format!("route uses {} hops, cap is {}", hops, max_hops),
			);
		}
	}

	if let Some(blacklist) = &routing.blacklist {
		for protocol in &route.protocols {
			if blacklist.contains(protocol) {
				report.push_error(
					"constraints.routing.blacklist",
					format!("route touches blacklisted protocol {}", protocol),
				);
			}
		}
	}

	if let Some(whitelist) = &routing.whitelist {
		if !whitelist.is_empty() {
			for protocol in &route.protocols {
				if !whitelist.contains(protocol) {
					report.push_error(
						"constraints.routing.whitelist",
						format!("route touches non-whitelisted protocol {}", protocol),
					);
				}
			}
		}
	}
}
