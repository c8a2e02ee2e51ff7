//! Engine run phases.
//!
//! The engine moves through a fixed forward path: built but inert, then
//! bootstrapping its collaborators, then serving the event stream, then
//! draining in-flight work after a shutdown request, then stopped. A
//! bootstrap or runtime breakdown parks it in `Failed`; both `Stopped` and
//! `Failed` are terminal. The drain phase owns the shutdown broadcast that
//! the ingestor, the flush loop and the store sweeper all select on.

use crate::error::CoreError;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
	/// Built, collaborators wired, no background task running yet.
	Idle,
	/// Spawning the flush loop, sweeper and listener.
	Starting,
	/// Consuming events and flushing windows.
	Serving,
	/// Shutdown requested; background tasks are winding down.
	Draining,
	/// All background tasks stopped cleanly.
	Stopped,
	/// Bootstrap or runtime breakdown; terminal.
	Failed,
}

impl EnginePhase {
	fn can_advance_to(self, next: EnginePhase) -> bool {
		use EnginePhase::*;

		match (self, next) {
			(Idle, Starting) => true,
			(Starting, Serving) => true,
			(Serving, Draining) => true,
			(Draining, Stopped) => true,
			// Anything still alive can break down.
			(Idle | Starting | Serving | Draining, Failed) => true,
			_ => false,
		}
	}
}

impl std::fmt::Display for EnginePhase {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Idle => "idle",
			Self::Starting => "starting",
			Self::Serving => "serving",
			Self::Draining => "draining",
			Self::Stopped => "stopped",
			Self::Failed => "failed",
		};
		write!(f, "{}", name)
	}
}

pub struct EngineLifecycle {
	phase: RwLock<EnginePhase>,
	shutdown_tx: broadcast::Sender<()>,
}

impl EngineLifecycle {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(16);

		Self {
			phase: RwLock::new(EnginePhase::Idle),
			shutdown_tx,
		}
	}

	pub async fn phase(&self) -> EnginePhase {
		*self.phase.read().await
	}

	pub async fn is_serving(&self) -> bool {
		*self.phase.read().await == EnginePhase::Serving
	}

	async fn advance(&self, next: EnginePhase) -> Result<(), CoreError> {
		let mut phase = self.phase.write().await;
		let current = *phase;

		if !current.can_advance_to(next) {
			return Err(CoreError::Lifecycle(format!(
				"engine is {} and cannot move to {}",
				current, next
			)));
		}

		*phase = next;
		info!(from = %current, to = %next, "Engine phase advanced");
		Ok(())
	}

	/// Claim the one startup slot. Fails when the engine already started.
	pub async fn begin_start(&self) -> Result<(), CoreError> {
		self.advance(EnginePhase::Starting).await
	}

	/// Background tasks are up; the event stream is being served.
	pub async fn mark_serving(&self) -> Result<(), CoreError> {
		self.advance(EnginePhase::Serving).await
	}

	/// Request shutdown: flips to draining and wakes every task that
	/// subscribed to the shutdown broadcast.
	pub async fn begin_drain(&self) -> Result<(), CoreError> {
		self.advance(EnginePhase::Draining).await?;
		let _ = self.shutdown_tx.send(());
		Ok(())
	}

	/// All background tasks have wound down.
	pub async fn mark_stopped(&self) -> Result<(), CoreError> {
		self.advance(EnginePhase::Stopped).await
	}

	/// Park the engine in the terminal failed phase.
	pub async fn fail(&self, reason: &str) {
		error!(reason, "Engine marked failed");
		let mut phase = self.phase.write().await;
		if phase.can_advance_to(EnginePhase::Failed) {
			*phase = EnginePhase::Failed;
		}
		drop(phase);
		// Failed tasks should not keep serving either.
		let _ = self.shutdown_tx.send(());
	}

	pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
		self.shutdown_tx.subscribe()
	}
}

impl Default for EngineLifecycle {
	fn default() -> Self {
		Self::new()
	}
}
