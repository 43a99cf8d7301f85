//! Decisions that can be taken on a workflow task.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An approval decision, sent to SAP as a decision code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Approve the task (`DecisionKey=0001`).
    Approve,
    /// Reject the task (`DecisionKey=0002`).
    Reject,
}

impl Decision {
    /// The SAP `DecisionKey` value.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Approve => "0001",
            Self::Reject => "0002",
        }
    }

    /// Comment sent when the caller does not provide one.
    #[must_use]
    pub const fn default_comment(self) -> &'static str {
        match self {
            Self::Approve => "Approved",
            Self::Reject => "Rejected",
        }
    }

    /// Past-tense verb for user-facing messages.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Reject => "rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "0001" => Ok(Self::Approve),
            "reject" | "0002" => Ok(Self::Reject),
            other => Err(format!("Unknown decision: {other}")),
        }
    }
}
