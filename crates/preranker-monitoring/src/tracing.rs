//! Tracing subscriber setup.

use ::tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
	pub level: Level,
	pub with_target: bool,
	pub json_format: bool,
}

impl Default for TracingConfig {
	fn default() -> Self {
		Self {
			level: Level::INFO,
			with_target: true,
			json_format: false,
		}
	}
}

impl TracingConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_level(mut self, level: Level) -> Self {
		self.level = level;
		self
	}

	pub fn with_json_format(mut self, json: bool) -> Self {
		self.json_format = json;
		self
	}

	/// Parse a textual level, falling back to INFO.
	pub fn from_level_str(level: &str) -> Self {
		let level = level.parse::<Level>().unwrap_or(Level::INFO);
		Self::default().with_level(level)
	}

	pub fn production() -> Self {
		Self {
			level: Level::INFO,
			with_target: false,
			json_format: true,
		}
	}
}

/// Initialize tracing with the given configuration
pub fn init_tracing(config: TracingConfig) -> Result<(), Box<dyn std::error::Error>> {
	let subscriber = tracing_subscriber::registry().with(
		tracing_subscriber::filter::LevelFilter::from_level(config.level),
	);

	if config.json_format {
		let json_layer = tracing_subscriber::fmt::layer()
			.json()
			.with_target(config.with_target);
		subscriber
			.with(json_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	} else {
		let fmt_layer = tracing_subscriber::fmt::layer().with_target(config.with_target);
		subscriber
			.with(fmt_layer)
			.try_init()
			.map_err(|e| format!("Failed to initialize tracing: {}", e))?;
	}

	info!("Tracing initialized with level: {:?}", config.level);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_level_parsing_falls_back_to_info() {
		assert_eq!(TracingConfig::from_level_str("debug").level, Level::DEBUG);
		assert_eq!(TracingConfig::from_level_str("nonsense").level, Level::INFO);
	}
}
