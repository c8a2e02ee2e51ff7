//! Error types for the pre-ranking engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
	#[error("chain error: {0}")]
	Chain(String),

	#[error("blob not found: {0}")]
	BlobNotFound(String),

	#[error("blob corrupt: {0}")]
	BlobCorrupt(String),

	#[error("simulation error: {0}")]
	Simulation(String),

	#[error("storage error: {0}")]
	Storage(String),

	#[error("delivery error: {0}")]
	Delivery(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("transient upstream error in {operation}: {message}")]
	Transient {
		operation: &'static str,
		message: String,
	},

	#[error("timed out during {0}")]
	Timeout(&'static str),

	#[error("internal invariant violated: {0}")]
	Internal(String),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl EngineError {
	pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
		EngineError::Transient {
			operation,
			message: message.into(),
		}
	}

	/// Whether an in-operation retry with back-off is worthwhile.
	pub fn is_transient(&self) -> bool {
		matches!(
			self,
			EngineError::Transient { .. } | EngineError::Timeout(_)
		)
	}
}
