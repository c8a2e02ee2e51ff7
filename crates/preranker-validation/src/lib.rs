//! Constraint validation split into two pure phases.
//!
//! Phase 1 runs before simulation on the solver's declared metadata; phase 2
//! runs on the dry-run effects. Both return a report of per-field issues;
//! a report is ok iff it carries no error-severity issue. A check whose
//! inputs cannot be determined is skipped, never failed.

pub mod phase1;
pub mod phase2;

pub use phase1::validate_pre_simulation;
pub use phase2::validate_post_simulation;

/// Scale a ratio into basis points, flooring. Falls back to a divide-first
/// approximation when the scaled numerator would overflow u128.
pub(crate) fn bps_ratio(numerator: u128, denominator: u128) -> u128 {
	if denominator == 0 {
		return 0;
	}
	match numerator.checked_mul(10_000) {
		Some(scaled) => scaled / denominator,
		None => numerator / (denominator / 10_000).max(1),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_bps_ratio() {
		assert_eq!(bps_ratio(5_000, 100_000), 500);
		assert_eq!(bps_ratio(1, 100_000), 0);
		assert_eq!(bps_ratio(100_000, 100_000), 10_000);
		assert_eq!(bps_ratio(0, 100_000), 0);
	}

	#[test]
	fn test_bps_ratio_survives_huge_amounts() {
		let huge = u128::MAX / 2;
		// 50% of the denominator, far past the checked_mul range.
		assert_eq!(bps_ratio(huge, u128::MAX), 4999);
	}
}
