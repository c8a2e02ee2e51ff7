//! Observability: tracing initialisation and component health checks.

pub mod health;
pub mod tracing;

pub use self::health::{HealthCheck, HealthCheckResult, HealthChecker, HealthStatus};
pub use self::tracing::{init_tracing, TracingConfig};
