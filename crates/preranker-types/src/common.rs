//! Common scalar types used throughout the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the unix epoch.
pub type TimestampMs = u64;

/// Opaque unique identifier of an intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl IntentId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for IntentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for IntentId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Opaque unique identifier of a solution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolutionId(pub String);

impl SolutionId {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SolutionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for SolutionId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

/// Extract the package identifier from a fully-qualified type tag
/// (`0xabc::module::Struct` -> `0xabc`).
pub fn package_of(type_tag: &str) -> &str {
	type_tag.split("::").next().unwrap_or(type_tag)
}

/// Package identifier of the chain's system framework. Balance changes and
/// object changes under this package are not attributable to a protocol.
pub const SYSTEM_PACKAGE: &str = "0x2";

/// Serde helpers for u128 amounts. The wire form is a decimal string, but
/// small numeric literals are accepted as well.
pub mod amount {
	use serde::{Deserialize, Deserializer, Serializer};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u64),
		Text(String),
	}

	pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Raw::deserialize(deserializer)? {
			Raw::Number(n) => Ok(n as u128),
			Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
		}
	}
}

/// Serde helpers for `Option<u128>` amounts.
pub mod amount_opt {
	use serde::{Deserialize, Deserializer, Serializer};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u64),
		Text(String),
	}

	pub fn serialize<S>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(v) => serializer.serialize_some(&v.to_string()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<Raw>::deserialize(deserializer)? {
			None => Ok(None),
			Some(Raw::Number(n)) => Ok(Some(n as u128)),
			Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
		}
	}
}

/// Serde helpers for signed i128 deltas (balance changes).
pub mod signed_amount {
	use serde::{Deserialize, Deserializer, Serializer};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(i64),
		Text(String),
	}

	pub fn serialize<S>(value: &i128, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&value.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Raw::deserialize(deserializer)? {
			Raw::Number(n) => Ok(n as i128),
			Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
		}
	}
}
