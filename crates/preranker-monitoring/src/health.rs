use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Health status of a component
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

impl HealthStatus {
	pub fn is_healthy(&self) -> bool {
		matches!(self, HealthStatus::Healthy)
	}
}

/// Health check result with details
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
	pub status: HealthStatus,
	pub message: String,
	pub timestamp: Instant,
	pub details: HashMap<String, String>,
}

impl HealthCheckResult {
	pub fn healthy(message: impl Into<String>) -> Self {
		Self {
			status: HealthStatus::Healthy,
			message: message.into(),
			timestamp: Instant::now(),
			details: HashMap::new(),
		}
	}

	pub fn degraded(message: impl Into<String>) -> Self {
		Self {
			status: HealthStatus::Degraded,
			message: message.into(),
			timestamp: Instant::now(),
			details: HashMap::new(),
		}
	}

	pub fn unhealthy(message: impl Into<String>) -> Self {
		Self {
			status: HealthStatus::Unhealthy,
			message: message.into(),
			timestamp: Instant::now(),
			details: HashMap::new(),
		}
	}

	pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.details.insert(key.into(), value.into());
		self
	}
}

/// Trait for implementing health checks
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
	async fn check(&self) -> HealthCheckResult;
	fn name(&self) -> &str;
}

/// Health check manager
pub struct HealthChecker {
	checks: Arc<RwLock<HashMap<String, Box<dyn HealthCheck>>>>,
	last_results: Arc<RwLock<HashMap<String, HealthCheckResult>>>,
}

impl HealthChecker {
	pub fn new() -> Self {
		Self {
			checks: Arc::new(RwLock::new(HashMap::new())),
			last_results: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	pub async fn register_check(&self, check: Box<dyn HealthCheck>) {
		let name = check.name().to_string();
		let mut checks = self.checks.write().await;
		checks.insert(name, check);
	}

	pub async fn run_all_checks(&self) -> HashMap<String, HealthCheckResult> {
		let checks = self.checks.read().await;
		let mut results = HashMap::new();

		for (name, check) in checks.iter() {
			let start = Instant::now();
			debug!("Running health check: {}", name);

			let result = check.check().await;
			let duration = start.elapsed();

			match result.status {
				HealthStatus::Healthy => debug!("Health check '{}' passed in {:?}", name, duration),
				HealthStatus::Degraded => warn!(
					"Health check '{}' degraded in {:?}: {}",
					name, duration, result.message
				),
				HealthStatus::Unhealthy => error!(
					"Health check '{}' failed in {:?}: {}",
					name, duration, result.message
				),
			}

			results.insert(name.clone(), result);
		}

		let mut last_results = self.last_results.write().await;
		*last_results = results.clone();

		results
	}

	pub async fn get_overall_health(&self) -> HealthStatus {
		let results = self.run_all_checks().await;

		if results.is_empty() {
			return HealthStatus::Healthy;
		}

		let mut has_degraded = false;
		for result in results.values() {
			match result.status {
				HealthStatus::Unhealthy => return HealthStatus::Unhealthy,
				HealthStatus::Degraded => has_degraded = true,
				HealthStatus::Healthy => {}
			}
		}

		if has_degraded {
			HealthStatus::Degraded
		} else {
			HealthStatus::Healthy
		}
	}

	/// Run checks on a fixed cadence until the shutdown signal fires.
	pub async fn run_periodic(
		&self,
		interval: Duration,
		mut shutdown: tokio::sync::broadcast::Receiver<()>,
	) {
		let mut ticker = tokio::time::interval(interval);
		loop {
			tokio::select! {
				_ = ticker.tick() => {
					let overall = self.get_overall_health().await;
					if !overall.is_healthy() {
						warn!("System health degraded: {:?}", overall);
					}
				}
				_ = shutdown.recv() => {
					info!("Health monitor received shutdown signal");
					break;
				}
			}
		}
	}
}

impl Default for HealthChecker {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct StaticCheck {
		name: String,
		status: HealthStatus,
	}

	#[async_trait::async_trait]
	impl HealthCheck for StaticCheck {
		async fn check(&self) -> HealthCheckResult {
			match self.status {
				HealthStatus::Healthy => HealthCheckResult::healthy("ok"),
				HealthStatus::Degraded => HealthCheckResult::degraded("slow"),
				HealthStatus::Unhealthy => HealthCheckResult::unhealthy("down"),
			}
		}

		fn name(&self) -> &str {
			&self.name
		}
	}

	#[tokio::test]
	async fn test_overall_health_aggregation() {
		let checker = HealthChecker::new();
		assert_eq!(checker.get_overall_health().await, HealthStatus::Healthy);

		checker
			.register_check(Box::new(StaticCheck {
				name: "store".to_string(),
				status: HealthStatus::Healthy,
			}))
			.await;
		assert_eq!(checker.get_overall_health().await, HealthStatus::Healthy);

		checker
			.register_check(Box::new(StaticCheck {
				name: "chain".to_string(),
				status: HealthStatus::Degraded,
			}))
			.await;
		assert_eq!(checker.get_overall_health().await, HealthStatus::Degraded);

		checker
			.register_check(Box::new(StaticCheck {
				name: "simulator".to_string(),
				status: HealthStatus::Unhealthy,
			}))
			.await;
		assert_eq!(checker.get_overall_health().await, HealthStatus::Unhealthy);
	}
}
