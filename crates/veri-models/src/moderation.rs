//! Moderation outcomes and the append-only audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::SafetyScores;
use crate::ids::AssetId;

/// Outcome of a single moderation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationOutcome {
    Approved,
    Rejected,
}

impl ModerationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationOutcome::Approved => "approved",
            ModerationOutcome::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ModerationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The decision produced by the moderation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationDecision {
    /// Whether the asset may be published
    pub approved: bool,
    /// Fraction of frames classified AI-generated
    pub authenticity_ratio: f64,
    /// Aggregated (per-category max) safety scores
    pub safety: SafetyScores,
    /// Human-readable explanation; names the first failing criterion
    pub reason: String,
}

impl ModerationDecision {
    pub fn outcome(&self) -> ModerationOutcome {
        if self.approved {
            ModerationOutcome::Approved
        } else {
            ModerationOutcome::Rejected
        }
    }
}

/// Append-only audit record of a moderation attempt.
///
/// One entry per attempt; entries are never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationLog {
    /// Asset that was screened
    pub asset_id: AssetId,
    /// Outcome of this attempt
    pub outcome: ModerationOutcome,
    /// Human-readable reason
    pub reason: String,
    /// Authenticity ratio measured in this attempt
    pub authenticity_score: f64,
    /// When the attempt concluded
    pub created_at: DateTime<Utc>,
}

impl ModerationLog {
    /// Build the audit entry for a decision.
    pub fn from_decision(asset_id: AssetId, decision: &ModerationDecision) -> Self {
        Self {
            asset_id,
            outcome: decision.outcome(),
            reason: decision.reason.clone(),
            authenticity_score: decision.authenticity_ratio,
            created_at: Utc::now(),
        }
    }
}
