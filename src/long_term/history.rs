//! Visit and session history consumed by the long-term aggregator.

use crate::core::labels::StressLabel;
use crate::core::report::ClassificationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded session within a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub created_at: DateTime<Utc>,
    /// Time-bucketed label data as stored by the session
    #[serde(default)]
    pub timeline_data: serde_json::Value,
    #[serde(default)]
    pub stress_percentage: Option<f64>,
    #[serde(default)]
    pub meditation_percentage: Option<f64>,
    #[serde(default)]
    pub amusement_percentage: Option<f64>,
    /// Narrative generated for the session
    #[serde(default)]
    pub ai_summary_story: Option<String>,
}

impl SessionEntry {
    /// Session entry derived from a classification report.
    pub fn from_report(report: &ClassificationReport, created_at: DateTime<Utc>) -> Self {
        let timeline: Vec<serde_json::Value> = report
            .segments
            .iter()
            .map(|s| {
                serde_json::json!({
                    "start": s.start_timestamp,
                    "end": s.end_timestamp,
                    "label_id": s.label_id,
                })
            })
            .collect();

        Self {
            created_at,
            timeline_data: serde_json::Value::Array(timeline),
            stress_percentage: Some(report.percentage_of(StressLabel::Stress)),
            meditation_percentage: Some(report.percentage_of(StressLabel::Meditation)),
            amusement_percentage: Some(report.percentage_of(StressLabel::Amusement)),
            ai_summary_story: Some(report.narrative()),
        }
    }
}

/// A visit with its clinician notes and sessions, sessions ordered by
/// creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitHistoryEntry {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub psychologist_notes: String,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

impl VisitHistoryEntry {
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            psychologist_notes: String::new(),
            ai_summary: None,
            sessions: Vec::new(),
        }
    }

    /// Mean of a per-session percentage over sessions that carry it.
    pub fn mean_percentage(&self, pick: impl Fn(&SessionEntry) -> Option<f64>) -> Option<f64> {
        let values: Vec<f64> = self.sessions.iter().filter_map(pick).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    pub fn mean_stress(&self) -> Option<f64> {
        self.mean_percentage(|s| s.stress_percentage)
    }
}
