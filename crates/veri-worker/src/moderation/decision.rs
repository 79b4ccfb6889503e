//! The approval decision.

use veri_models::{FrameClass, ModerationDecision, SafetyScores};

use crate::config::Thresholds;

/// Fraction of frames classified AI-generated over the full frame set.
pub fn authenticity_ratio(classes: &[FrameClass]) -> f64 {
    if classes.is_empty() {
        return 0.0;
    }
    let ai_count = classes.iter().filter(|c| c.is_ai_generated).count();
    ai_count as f64 / classes.len() as f64
}

/// Per-category max across all sampled frames.
pub fn aggregate_safety(scores: &[SafetyScores]) -> SafetyScores {
    scores
        .iter()
        .copied()
        .fold(SafetyScores::default(), SafetyScores::max)
}

/// Approve iff the AI ratio clears the floor AND no safety category exceeds
/// its ceiling. The rejection reason names the first failing criterion:
/// authenticity shortfall first, then the highest-severity violation.
pub fn decide(ratio: f64, safety: SafetyScores, thresholds: &Thresholds) -> ModerationDecision {
    if ratio < thresholds.authenticity {
        return ModerationDecision {
            approved: false,
            authenticity_ratio: ratio,
            safety,
            reason: format!(
                "Rejected: AI-authenticity ratio {:.1}% is below the required {:.0}%",
                ratio * 100.0,
                thresholds.authenticity * 100.0
            ),
        };
    }

    let worst_violation = veri_models::SafetyCategory::ALL
        .iter()
        .map(|&c| (c, safety.get(c), thresholds.safety_ceiling(c)))
        .filter(|(_, score, ceiling)| score > ceiling)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((category, score, ceiling)) = worst_violation {
        return ModerationDecision {
            approved: false,
            authenticity_ratio: ratio,
            safety,
            reason: format!(
                "Rejected: {} content score {:.2} exceeds the allowed {:.2}",
                category, score, ceiling
            ),
        };
    }

    ModerationDecision {
        approved: true,
        authenticity_ratio: ratio,
        safety,
        reason: format!(
            "Approved: AI-authenticity ratio {:.1}% with no safety violations",
            ratio * 100.0
        ),
    }
}
