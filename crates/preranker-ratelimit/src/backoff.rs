use rand::Rng;
use std::time::Duration;

/// Exponential back-off with optional jitter.
pub struct ExponentialBackoff {
	initial: Duration,
	max: Duration,
	multiplier: f64,
	jitter: f64,
	current_attempt: u32,
}

impl ExponentialBackoff {
	pub fn new(initial: Duration, max: Duration) -> Self {
		Self {
			initial,
			max,
			multiplier: 2.0,
			jitter: 0.0,
			current_attempt: 0,
		}
	}

	pub fn with_multiplier(mut self, multiplier: f64) -> Self {
		self.multiplier = multiplier;
		self
	}

	/// Spread delays by up to `fraction` of their nominal value so callers
	/// retrying against the same upstream do not synchronise.
	pub fn with_jitter(mut self, fraction: f64) -> Self {
		self.jitter = fraction.clamp(0.0, 1.0);
		self
	}

	pub fn next_delay(&mut self) -> Duration {
		let delay = if self.current_attempt == 0 {
			self.initial
		} else {
			let multiplier = self.multiplier.powi(self.current_attempt as i32);
			let delay_ms = self.initial.as_millis() as f64 * multiplier;
			let delay_ms = delay_ms.min(self.max.as_millis() as f64);
			Duration::from_millis(delay_ms as u64)
		};

		self.current_attempt += 1;
		self.apply_jitter(delay)
	}

	fn apply_jitter(&self, delay: Duration) -> Duration {
		if self.jitter == 0.0 {
			return delay;
		}
		let base = delay.as_millis() as f64;
		let spread = base * self.jitter;
		let jittered = base - spread + rand::thread_rng().gen_range(0.0..=2.0 * spread);
		Duration::from_millis(jittered as u64)
	}

	pub fn reset(&mut self) {
		self.current_attempt = 0;
	}

	pub fn current_attempt(&self) -> u32 {
		self.current_attempt
	}
}

impl Default for ExponentialBackoff {
	fn default() -> Self {
		Self::new(Duration::from_millis(100), Duration::from_secs(30))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_progression_doubles_until_cap() {
		let mut backoff =
			ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));

		assert_eq!(backoff.next_delay(), Duration::from_millis(100));
		assert_eq!(backoff.next_delay(), Duration::from_millis(200));
		assert_eq!(backoff.next_delay(), Duration::from_millis(400));
		assert_eq!(backoff.next_delay(), Duration::from_millis(800));
		assert_eq!(backoff.next_delay(), Duration::from_secs(1));
		assert_eq!(backoff.next_delay(), Duration::from_secs(1));
	}

	#[test]
	fn test_reset_restarts_the_sequence() {
		let mut backoff =
			ExponentialBackoff::new(Duration::from_millis(50), Duration::from_secs(5));

		backoff.next_delay();
		backoff.next_delay();
		assert_eq!(backoff.current_attempt(), 2);

		backoff.reset();
		assert_eq!(backoff.current_attempt(), 0);
		assert_eq!(backoff.next_delay(), Duration::from_millis(50));
	}

	#[test]
	fn test_jitter_stays_within_bounds() {
		let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1))
			.with_jitter(0.5);

		for _ in 0..50 {
			let delay = backoff.next_delay().as_millis() as u64;
			// Nominal delays are capped at 1000ms, so jittered values stay
			// within [0, 1500].
			assert!(delay <= 1500, "delay {} out of bounds", delay);
		}
	}
}
