//! Explicit allow/deny outcome of a policy evaluation.

use std::fmt;

/// Why an object was refused admission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Short machine-readable label used in logs and metrics
    pub reason: &'static str,
    /// Human-readable explanation returned to the caller
    pub message: String,
}

impl PolicyViolation {
    pub fn new(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of evaluating one policy against one object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Admitted,
    Denied(PolicyViolation),
}

impl Verdict {
    /// Create a denial
    pub fn deny(reason: &'static str, message: impl Into<String>) -> Self {
        Verdict::Denied(PolicyViolation::new(reason, message))
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted)
    }

    pub fn violation(&self) -> Option<&PolicyViolation> {
        match self {
            Verdict::Admitted => None,
            Verdict::Denied(violation) => Some(violation),
        }
    }
}

impl From<PolicyViolation> for Verdict {
    fn from(violation: PolicyViolation) -> Self {
        Verdict::Denied(violation)
    }
}
