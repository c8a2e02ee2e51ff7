//! Dry-run execution of solution transactions against the simulator service.

pub mod implementations;

pub use implementations::http::{HttpSimulatorClient, HttpSimulatorConfig};

use async_trait::async_trait;
use preranker_types::errors::Result;
use preranker_types::DryRun;

/// Evaluates a transaction without on-chain commit.
///
/// The pipeline issues exactly one call per solution; any retry policy the
/// simulator service wants lives behind this interface. A simulator-reported
/// execution failure is not an error here, it arrives as `DryRun.status`.
#[async_trait]
pub trait SimulatorClient: Send + Sync {
	async fn dry_run(&self, transaction_bytes: &[u8]) -> Result<DryRun>;
}
