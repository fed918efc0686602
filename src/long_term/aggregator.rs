//! Longitudinal summary over a patient's visit history.
//!
//! The aggregator is a pure function of the ordered history. It never fails
//! because the history is short; it fails only on inconsistent input, in
//! which case the caller keeps the previous summary.

use crate::core::report::round2;
use crate::long_term::history::VisitHistoryEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of stress across visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressTrend {
    Improving,
    Stable,
    Worsening,
    InsufficientData,
}

impl fmt::Display for StressTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StressTrend::Improving => "improving (stress decreasing)",
            StressTrend::Stable => "stable",
            StressTrend::Worsening => "worsening (stress increasing)",
            StressTrend::InsufficientData => "not yet determinable",
        };
        f.write_str(text)
    }
}

/// Aggregator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatorSettings {
    /// Minimum per-visit change in stress percentage points to call a trend
    pub trend_tolerance: f64,
    /// Visits whose mean stress exceeds this are counted as high-stress
    pub high_stress_threshold: f64,
    /// Longest excerpt of clinician notes quoted in the narrative
    pub notes_excerpt_chars: usize,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            trend_tolerance: 2.0,
            high_stress_threshold: 50.0,
            notes_excerpt_chars: 200,
        }
    }
}

/// Aggregation failure. Never propagated past the post-write hook.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Visits are not in chronological order
    Unordered { index: usize },
    /// A session percentage is outside [0, 100] or not finite
    InvalidPercentage {
        visit: usize,
        session: usize,
        field: &'static str,
        value: f64,
    },
}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationError::Unordered { index } => {
                write!(f, "visit {index} is dated before the previous visit")
            }
            AggregationError::InvalidPercentage {
                visit,
                session,
                field,
                value,
            } => write!(
                f,
                "visit {visit} session {session}: {field} = {value} is not a percentage"
            ),
        }
    }
}

impl std::error::Error for AggregationError {}

/// Result of a long-term analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermSummary {
    pub visits_analyzed: usize,
    pub sessions_analyzed: usize,
    pub trend: StressTrend,
    /// Least-squares change in mean stress per visit (percentage points)
    pub stress_slope_per_visit: Option<f64>,
    pub first_visit_stress: Option<f64>,
    pub latest_visit_stress: Option<f64>,
    pub mean_stress: Option<f64>,
    pub mean_meditation: Option<f64>,
    pub high_stress_visits: usize,
    pub narrative: String,
}

/// Analyze a chronologically ordered visit history.
pub fn analyze_long_term_progress(
    visits: &[VisitHistoryEntry],
    settings: &AggregatorSettings,
) -> Result<LongTermSummary, AggregationError> {
    validate(visits)?;

    let sessions_analyzed = visits.iter().map(|v| v.sessions.len()).sum();
    let per_visit: Vec<f64> = visits.iter().filter_map(|v| v.mean_stress()).collect();
    let meditation: Vec<f64> = visits
        .iter()
        .filter_map(|v| v.mean_percentage(|s| s.meditation_percentage))
        .collect();

    let slope = least_squares_slope(&per_visit);
    let trend = match slope {
        None => StressTrend::InsufficientData,
        Some(s) if s <= -settings.trend_tolerance => StressTrend::Improving,
        Some(s) if s >= settings.trend_tolerance => StressTrend::Worsening,
        Some(_) => StressTrend::Stable,
    };

    let high_stress_visits = per_visit
        .iter()
        .filter(|&&p| p > settings.high_stress_threshold)
        .count();

    let mut summary = LongTermSummary {
        visits_analyzed: visits.len(),
        sessions_analyzed,
        trend,
        stress_slope_per_visit: slope.map(round2),
        first_visit_stress: per_visit.first().copied().map(round2),
        latest_visit_stress: per_visit.last().copied().map(round2),
        mean_stress: mean(&per_visit).map(round2),
        mean_meditation: mean(&meditation).map(round2),
        high_stress_visits,
        narrative: String::new(),
    };
    summary.narrative = compose_narrative(visits, &summary, settings);

    Ok(summary)
}

fn validate(visits: &[VisitHistoryEntry]) -> Result<(), AggregationError> {
    for (index, pair) in visits.windows(2).enumerate() {
        if pair[1].date < pair[0].date {
            return Err(AggregationError::Unordered { index: index + 1 });
        }
    }

    for (v, visit) in visits.iter().enumerate() {
        for (s, session) in visit.sessions.iter().enumerate() {
            for (field, value) in [
                ("stress_percentage", session.stress_percentage),
                ("meditation_percentage", session.meditation_percentage),
                ("amusement_percentage", session.amusement_percentage),
            ] {
                if let Some(value) = value {
                    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                        return Err(AggregationError::InvalidPercentage {
                            visit: v,
                            session: s,
                            field,
                            value,
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Slope of `values` against their index; needs at least two points.
fn least_squares_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });
    Some(num / den)
}

fn compose_narrative(
    visits: &[VisitHistoryEntry],
    summary: &LongTermSummary,
    settings: &AggregatorSettings,
) -> String {
    let (first, last) = match (visits.first(), visits.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return "No visits recorded yet. A long-term analysis will be available after the \
                    first visit."
                .to_string()
        }
    };

    let mut parts = Vec::new();

    if visits.len() == 1 {
        parts.push(format!(
            "One visit recorded on {} with {} session(s).",
            first.date.format("%Y-%m-%d"),
            summary.sessions_analyzed
        ));
    } else {
        parts.push(format!(
            "{} visits between {} and {} with {} session(s) in total.",
            visits.len(),
            first.date.format("%Y-%m-%d"),
            last.date.format("%Y-%m-%d"),
            summary.sessions_analyzed
        ));
    }

    match (summary.first_visit_stress, summary.latest_visit_stress, summary.mean_stress) {
        (Some(first), Some(latest), Some(mean)) if summary.trend != StressTrend::InsufficientData => {
            parts.push(format!(
                "Stress moved from {first:.2}% to {latest:.2}% of segments (mean {mean:.2}%); \
                 the trend is {}.",
                summary.trend
            ));
        }
        (_, Some(latest), _) => parts.push(format!(
            "Stress was detected in {latest:.2}% of segments; more visits are needed to \
             establish a trend."
        )),
        _ => parts.push("No stress measurements are available yet.".to_string()),
    }

    if summary.high_stress_visits > 0 {
        parts.push(format!(
            "{} visit(s) showed stress above {:.0}% of segments.",
            summary.high_stress_visits, settings.high_stress_threshold
        ));
    }

    if let Some(meditation) = summary.mean_meditation {
        parts.push(format!(
            "On average {meditation:.2}% of segments were classified as meditation."
        ));
    }

    let notes = last.psychologist_notes.trim();
    if !notes.is_empty() {
        let excerpt: String = notes.chars().take(settings.notes_excerpt_chars).collect();
        let ellipsis = if notes.chars().count() > settings.notes_excerpt_chars {
            "..."
        } else {
            ""
        };
        parts.push(format!("Latest clinician notes: \"{excerpt}{ellipsis}\""));
    }

    if let Some(story) = last
        .sessions
        .iter()
        .rev()
        .find_map(|s| s.ai_summary_story.as_deref())
    {
        parts.push(format!("Most recent session: {story}"));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::long_term::history::SessionEntry;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn visit(n: i64, stress: &[f64]) -> VisitHistoryEntry {
        let mut v = VisitHistoryEntry::new(day(n));
        v.sessions = stress
            .iter()
            .map(|&p| SessionEntry {
                created_at: day(n),
                timeline_data: serde_json::Value::Null,
                stress_percentage: Some(p),
                meditation_percentage: Some(10.0),
                amusement_percentage: None,
                ai_summary_story: None,
            })
            .collect();
        v
    }

    #[test]
    fn test_empty_history_is_valid() {
        let summary = analyze_long_term_progress(&[], &AggregatorSettings::default()).unwrap();
        assert_eq!(summary.visits_analyzed, 0);
        assert_eq!(summary.trend, StressTrend::InsufficientData);
        assert!(summary.narrative.contains("No visits"));
    }

    #[test]
    fn test_single_visit() {
        let summary =
            analyze_long_term_progress(&[visit(0, &[40.0, 20.0])], &AggregatorSettings::default())
                .unwrap();
        assert_eq!(summary.trend, StressTrend::InsufficientData);
        assert_eq!(summary.latest_visit_stress, Some(30.0));
        assert!(summary.narrative.contains("One visit"));
    }

    #[test]
    fn test_improving_trend() {
        let history = vec![visit(0, &[70.0]), visit(7, &[55.0]), visit(14, &[30.0])];
        let summary = analyze_long_term_progress(&history, &AggregatorSettings::default()).unwrap();

        assert_eq!(summary.trend, StressTrend::Improving);
        assert_eq!(summary.stress_slope_per_visit, Some(-20.0));
        assert_eq!(summary.high_stress_visits, 2);
        assert_eq!(summary.mean_meditation, Some(10.0));
        assert!(summary.narrative.contains("improving"));
    }

    #[test]
    fn test_worsening_and_stable() {
        let worse = vec![visit(0, &[10.0]), visit(1, &[40.0])];
        let summary = analyze_long_term_progress(&worse, &AggregatorSettings::default()).unwrap();
        assert_eq!(summary.trend, StressTrend::Worsening);

        let flat = vec![visit(0, &[20.0]), visit(1, &[21.0]), visit(2, &[20.5])];
        let summary = analyze_long_term_progress(&flat, &AggregatorSettings::default()).unwrap();
        assert_eq!(summary.trend, StressTrend::Stable);
    }

    #[test]
    fn test_visits_without_sessions() {
        let history = vec![VisitHistoryEntry::new(day(0)), VisitHistoryEntry::new(day(3))];
        let summary = analyze_long_term_progress(&history, &AggregatorSettings::default()).unwrap();
        assert_eq!(summary.trend, StressTrend::InsufficientData);
        assert!(summary.narrative.contains("No stress measurements"));
    }

    #[test]
    fn test_rejects_unordered_history() {
        let history = vec![visit(5, &[10.0]), visit(1, &[10.0])];
        let err = analyze_long_term_progress(&history, &AggregatorSettings::default()).unwrap_err();
        assert_eq!(err, AggregationError::Unordered { index: 1 });
    }

    #[test]
    fn test_rejects_bad_percentage() {
        let history = vec![visit(0, &[120.0])];
        let err = analyze_long_term_progress(&history, &AggregatorSettings::default()).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::InvalidPercentage {
                field: "stress_percentage",
                ..
            }
        ));
    }

    #[test]
    fn test_notes_excerpt() {
        let mut last = visit(1, &[20.0]);
        last.psychologist_notes = "x".repeat(300);
        let history = vec![visit(0, &[25.0]), last];
        let summary = analyze_long_term_progress(&history, &AggregatorSettings::default()).unwrap();
        assert!(summary.narrative.contains(&format!("\"{}...\"", "x".repeat(200))));
    }
}
