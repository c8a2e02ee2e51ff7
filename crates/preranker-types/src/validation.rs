//! Validation report types shared by both validator phases.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Error,
	Warning,
}

/// A single finding produced by a constraint check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
	pub field: String,
	pub message: String,
	pub severity: Severity,
}

/// Outcome of a validation phase. `ok()` holds iff no error-severity issue
/// was recorded; warnings never fail a solution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
	pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn ok(&self) -> bool {
		!self
			.issues
			.iter()
			.any(|issue| issue.severity == Severity::Error)
	}

	pub fn push_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.issues.push(ValidationIssue {
			field: field.into(),
			message: message.into(),
			severity: Severity::Error,
		});
	}

	pub fn push_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.issues.push(ValidationIssue {
			field: field.into(),
			message: message.into(),
			severity: Severity::Warning,
		});
	}

	pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
		self.issues
			.iter()
			.filter(|issue| issue.severity == Severity::Error)
	}
}
