//! Validation report types: findings, severity levels, and aggregation.

use serde::Serialize;

/// Severity level of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The check passed.
    Pass,
    /// Worth a look, but the object is still usable.
    Warning,
    /// The object misuses a symbol.
    Failure,
}

/// Overall verdict on a validated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// No warnings and no failures.
    Ok,
    /// Warnings only.
    Warning,
    /// At least one failure.
    Error,
}

/// A single finding about one symbol occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Short identifier of the check that produced this finding.
    pub check: String,
    /// Human-readable message.
    pub message: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// Additional detail lines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Finding {
    /// Creates a passing finding.
    pub fn pass(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, message, Severity::Pass)
    }

    /// Creates a failure.
    pub fn fail(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, message, Severity::Failure)
    }

    /// Creates a failure with additional detail lines.
    pub fn fail_with_details(
        check: impl Into<String>,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        Self {
            details,
            ..Self::fail(check, message)
        }
    }

    /// Creates a warning.
    pub fn warn(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(check, message, Severity::Warning)
    }

    fn new(check: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            severity,
            details: Vec::new(),
        }
    }

    /// Returns true if this finding is a failure.
    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Failure
    }
}

/// Findings for one validated object.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    /// Findings in traversal order.
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a finding.
    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Appends all findings of another report.
    pub fn extend(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    /// Number of failures.
    pub fn failure_count(&self) -> usize {
        self.count(Severity::Failure)
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Returns true if there are no failures.
    pub fn all_passed(&self) -> bool {
        self.failure_count() == 0
    }

    /// The worst severity found, folded into an [`Outcome`].
    pub fn outcome(&self) -> Outcome {
        match self.findings.iter().map(|f| f.severity).max() {
            Some(Severity::Failure) => Outcome::Error,
            Some(Severity::Warning) => Outcome::Warning,
            _ => Outcome::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_follows_worst_severity() {
        let mut report = ValidationReport::new();
        assert_eq!(report.outcome(), Outcome::Ok);
        report.push(Finding::pass("defined", "arith1#plus"));
        assert_eq!(report.outcome(), Outcome::Ok);
        report.push(Finding::warn("status", "experimental"));
        assert_eq!(report.outcome(), Outcome::Warning);
        assert!(report.all_passed());

        let mut other = ValidationReport::new();
        other.push(Finding::fail_with_details("role", "bad", vec!["x".into()]));
        report.extend(other);
        assert_eq!(report.outcome(), Outcome::Error);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn serializes_lowercase_severity() {
        let finding = Finding::warn("defined", "unknown symbol");
        let json = serde_json::to_string(&finding).unwrap();
        assert_eq!(
            json,
            r#"{"check":"defined","message":"unknown symbol","severity":"warning"}"#
        );
    }
}
