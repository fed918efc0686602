//! Affective state labels and the overall stress tiers.
//!
//! Label ids follow the WESAD protocol numbering used by the frozen model:
//! 0 = transient/undefined, 1 = baseline, 2 = stress, 3 = amusement,
//! 4 = meditation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric label id as carried by reports, model artifacts and datasets.
pub type LabelId = i64;

/// A predicted affective state for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLabel {
    Transient,
    Baseline,
    Stress,
    Amusement,
    Meditation,
}

impl StressLabel {
    /// All labels in id order.
    pub const ALL: [StressLabel; 5] = [
        StressLabel::Transient,
        StressLabel::Baseline,
        StressLabel::Stress,
        StressLabel::Amusement,
        StressLabel::Meditation,
    ];

    /// Numeric id as emitted in reports.
    pub fn id(self) -> LabelId {
        match self {
            StressLabel::Transient => 0,
            StressLabel::Baseline => 1,
            StressLabel::Stress => 2,
            StressLabel::Amusement => 3,
            StressLabel::Meditation => 4,
        }
    }

    /// Resolve a numeric id; `None` for ids outside 0..=4.
    pub fn from_id(id: LabelId) -> Option<Self> {
        match id {
            0 => Some(StressLabel::Transient),
            1 => Some(StressLabel::Baseline),
            2 => Some(StressLabel::Stress),
            3 => Some(StressLabel::Amusement),
            4 => Some(StressLabel::Meditation),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            StressLabel::Transient => "transient/not_defined",
            StressLabel::Baseline => "baseline",
            StressLabel::Stress => "stress",
            StressLabel::Amusement => "amusement",
            StressLabel::Meditation => "meditation",
        }
    }
}

impl fmt::Display for StressLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name for a raw label id, including ids the model does not know.
pub fn label_name(id: LabelId) -> String {
    StressLabel::from_id(id)
        .map(|l| l.name().to_string())
        .unwrap_or_else(|| format!("unknown_{id}"))
}

/// Overall stress tier derived from the stress-class percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    Low,
    Moderate,
    High,
}

impl StressLevel {
    /// Numeric tier value (1 = low, 2 = moderate, 3 = high).
    pub fn value(self) -> u8 {
        match self {
            StressLevel::Low => 1,
            StressLevel::Moderate => 2,
            StressLevel::High => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StressLevel::Low => "Low",
            StressLevel::Moderate => "Moderate",
            StressLevel::High => "High",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cut points mapping a stress percentage onto a [`StressLevel`].
///
/// `p < moderate_from` is low, `p > high_above` is high, everything in
/// between (both ends inclusive) is moderate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressThresholds {
    pub moderate_from: f64,
    pub high_above: f64,
}

impl Default for StressThresholds {
    fn default() -> Self {
        Self {
            moderate_from: 33.0,
            high_above: 66.0,
        }
    }
}

impl StressThresholds {
    /// Thresholds must be ordered and lie within [0, 100].
    pub fn is_valid(&self) -> bool {
        self.moderate_from.is_finite()
            && self.high_above.is_finite()
            && (0.0..=100.0).contains(&self.moderate_from)
            && (0.0..=100.0).contains(&self.high_above)
            && self.moderate_from <= self.high_above
    }

    /// Map a percentage onto its tier.
    pub fn level_for(&self, stress_percentage: f64) -> StressLevel {
        if stress_percentage < self.moderate_from {
            StressLevel::Low
        } else if stress_percentage > self.high_above {
            StressLevel::High
        } else {
            StressLevel::Moderate
        }
    }
}
