//! Event ingestion: polls the chain for intent and solution events, hands
//! them to the coordinator in ascending order and persists the cursor only
//! once every handed event has fully settled.

pub mod implementations;
pub mod ingestor;
pub mod source;
pub mod wire;

pub use implementations::rpc::{RpcEventSource, RpcEventSourceConfig};
pub use ingestor::{EventHandler, EventIngestor, HandlerAck, IngestorConfig};
pub use source::{EventFilter, EventPage, EventSource};
