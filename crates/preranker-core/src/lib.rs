//! Intent lifecycle coordination and engine wiring.

pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod lifecycle;

pub use context::{IntentContext, IntentState};
pub use coordinator::{Coordinator, CoordinatorConfig, StatsSnapshot};
pub use engine::{Engine, EngineBuilder, StatusReport};
pub use error::CoreError;
pub use lifecycle::{EngineLifecycle, EnginePhase};
