//! Frame references and classification results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a single sampled frame of an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRef {
    /// Zero-based frame index (one frame per second of playback)
    pub index: usize,
    /// URL the classification providers fetch the frame from
    pub url: String,
}

impl FrameRef {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}

/// Authenticity classification of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameClass {
    /// Whether the frame was classified as AI-generated
    pub is_ai_generated: bool,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
}

impl FrameClass {
    pub fn new(is_ai_generated: bool, confidence: f64) -> Self {
        Self {
            is_ai_generated,
            confidence,
        }
    }
}

/// Content-policy categories scored by the safety classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCategory {
    Explicit,
    Violence,
    Hate,
    SelfHarm,
}

impl SafetyCategory {
    /// All categories, in a stable order.
    pub const ALL: [SafetyCategory; 4] = [
        SafetyCategory::Explicit,
        SafetyCategory::Violence,
        SafetyCategory::Hate,
        SafetyCategory::SelfHarm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyCategory::Explicit => "explicit",
            SafetyCategory::Violence => "violence",
            SafetyCategory::Hate => "hate",
            SafetyCategory::SelfHarm => "self_harm",
        }
    }
}

impl fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-category safety scores for a frame (or aggregated over frames).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SafetyScores {
    pub explicit: f64,
    pub violence: f64,
    pub hate: f64,
    pub self_harm: f64,
}

impl SafetyScores {
    /// Score for a single category.
    pub fn get(&self, category: SafetyCategory) -> f64 {
        match category {
            SafetyCategory::Explicit => self.explicit,
            SafetyCategory::Violence => self.violence,
            SafetyCategory::Hate => self.hate,
            SafetyCategory::SelfHarm => self.self_harm,
        }
    }

    /// Per-category maximum of two score sets.
    ///
    /// A single bad frame is enough to flag the whole asset, so aggregation
    /// over frames takes the max, never the average.
    pub fn max(self, other: SafetyScores) -> SafetyScores {
        SafetyScores {
            explicit: self.explicit.max(other.explicit),
            violence: self.violence.max(other.violence),
            hate: self.hate.max(other.hate),
            self_harm: self.self_harm.max(other.self_harm),
        }
    }

    /// The highest-scoring category and its score.
    pub fn worst(&self) -> (SafetyCategory, f64) {
        let mut worst = (SafetyCategory::Explicit, self.explicit);
        for &category in &SafetyCategory::ALL[1..] {
            let score = self.get(category);
            if score > worst.1 {
                worst = (category, score);
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_scores_max_is_per_category() {
        let a = SafetyScores {
            explicit: 0.1,
            violence: 0.9,
            hate: 0.0,
            self_harm: 0.2,
        };
        let b = SafetyScores {
            explicit: 0.5,
            violence: 0.3,
            hate: 0.1,
            self_harm: 0.2,
        };

        let m = a.max(b);
        assert_eq!(m.explicit, 0.5);
        assert_eq!(m.violence, 0.9);
        assert_eq!(m.hate, 0.1);
        assert_eq!(m.self_harm, 0.2);
    }

    #[test]
    fn test_worst_picks_highest_category() {
        let scores = SafetyScores {
            explicit: 0.2,
            violence: 0.85,
            hate: 0.1,
            self_harm: 0.0,
        };
        let (category, score) = scores.worst();
        assert_eq!(category, SafetyCategory::Violence);
        assert_eq!(score, 0.85);
    }
}
