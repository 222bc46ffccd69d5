//! Final decision categories

use serde::{Deserialize, Serialize};

/// The four outcomes an incident can end in.
///
/// Ordered from least to most automated, so `min()` of two decisions is
/// always the more conservative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Route to a human operator for review
    HumanReview,
    /// Escalate to the owning on-call team
    Escalate,
    /// A remediation was issued; keep the ticket open until it lands
    AutoRetry,
    /// Resolved automatically; close the ticket
    AutoClose,
}

impl Decision {
    /// Whether this decision lets the system act without a human
    pub fn is_automated(self) -> bool {
        matches!(self, Self::AutoClose | Self::AutoRetry)
    }

    /// Ticket status the downstream updater should set
    pub fn ticket_status(self) -> &'static str {
        match self {
            Self::AutoClose => "resolved",
            Self::AutoRetry => "in_progress",
            Self::Escalate => "escalated",
            Self::HumanReview => "on_hold",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HumanReview => "human_review",
            Self::Escalate => "escalate",
            Self::AutoRetry => "auto_retry",
            Self::AutoClose => "auto_close",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::HumanReview,
            Self::Escalate,
            Self::AutoRetry,
            Self::AutoClose,
        ]
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| format!("unknown decision `{s}`"))
    }
}
