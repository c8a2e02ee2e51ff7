//! Retry pacing utilities shared by the upstream clients.

pub mod backoff;

pub use backoff::ExponentialBackoff;
