//! Instant pre-ranking of a single solution: fetch, validate, simulate,
//! validate again, extract features. Ordered and fast-fail; the first failed
//! step decides the fail record and nothing after it runs.

pub mod features;
pub mod pipeline;

pub use features::extract_features;
pub use pipeline::{PipelineOutcome, SolutionPipeline};
