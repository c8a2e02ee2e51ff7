use preranker_types::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
	#[error("Lifecycle error: {0}")]
	Lifecycle(String),

	#[error("Bootstrap error: {0}")]
	Bootstrap(String),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error(transparent)]
	Engine(#[from] EngineError),
}
