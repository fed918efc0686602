//! Classification report: per-segment predictions, label statistics,
//! overall stress tier and stress moments.

use crate::core::labels::{LabelId, StressLabel, StressThresholds};
use crate::core::windowing::WindowSpec;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A window paired with its predicted label and wall-clock interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPrediction {
    pub segment_index: usize,
    pub label_id: LabelId,
    pub label_name: String,
    /// Model probability for the predicted label
    pub confidence: f64,
    pub start_time_seconds: u64,
    pub end_time_seconds: u64,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
}

impl SegmentPrediction {
    /// Timestamps past the last representable instant saturate there; the
    /// pipeline rejects such starts before building segments.
    pub fn new(
        segment_index: usize,
        label: StressLabel,
        confidence: f64,
        recording_start: DateTime<Utc>,
        spec: &WindowSpec,
    ) -> Self {
        let start = segment_index as u64 * spec.step_secs as u64;
        let end = start + spec.window_secs as u64;
        Self {
            segment_index,
            label_id: label.id(),
            label_name: label.name().to_string(),
            confidence,
            start_time_seconds: start,
            end_time_seconds: end,
            start_timestamp: offset_timestamp(recording_start, start),
            end_timestamp: offset_timestamp(recording_start, end),
        }
    }

    pub fn is_stress(&self) -> bool {
        self.label_id == StressLabel::Stress.id()
    }
}

/// `start + secs`, or `None` when the result is not representable.
pub fn checked_offset(start: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    start.checked_add_signed(Duration::try_seconds(secs)?)
}

fn offset_timestamp(start: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    checked_offset(start, secs).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A maximal run of index-adjacent stress segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressMoment {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub duration_seconds: u64,
    pub segment_count: usize,
    pub first_segment_index: usize,
    pub last_segment_index: usize,
    /// Mean model confidence over the run
    pub confidence: f64,
}

/// Count and share of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelStatistic {
    pub label_id: LabelId,
    pub label_name: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub overall_stress_level: String,
    /// Tier value: 1 = low, 2 = moderate, 3 = high
    pub overall_stress_value: u8,
    pub stress_percentage: f64,
    /// Most frequent label across segments
    pub dominant_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub analysis_date: DateTime<Utc>,
    pub start_timestamp: DateTime<Utc>,
    pub total_duration_seconds: u64,
    pub num_segments: usize,
    pub segment_duration_seconds: u32,
    pub step_seconds: u32,
    pub sample_rate_hz: u32,
    /// Whether the recording came from the simulator
    pub simulated: bool,
}

/// Full stress report for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub statistics: Vec<LabelStatistic>,
    pub segments: Vec<SegmentPrediction>,
    pub stress_moments: Vec<StressMoment>,
}

impl ClassificationReport {
    /// Aggregate ordered segment predictions into a report.
    pub fn build(
        segments: Vec<SegmentPrediction>,
        recording_start: DateTime<Utc>,
        analysis_date: DateTime<Utc>,
        spec: &WindowSpec,
        thresholds: &StressThresholds,
        simulated: bool,
    ) -> Self {
        let statistics = label_statistics(&segments);
        let stress_percentage = share_of(&statistics, StressLabel::Stress, segments.len());
        let level = thresholds.level_for(stress_percentage);

        let dominant_state = statistics
            .iter()
            .filter(|s| s.count > 0)
            .fold(None::<&LabelStatistic>, |best, s| match best {
                Some(b) if b.count >= s.count => Some(b),
                _ => Some(s),
            })
            .map(|s| s.label_name.clone())
            .unwrap_or_else(|| StressLabel::Transient.name().to_string());

        let total_duration_seconds = segments
            .last()
            .map(|s| s.end_time_seconds)
            .unwrap_or(0);

        let stress_moments = detect_stress_moments(&segments);

        Self {
            metadata: ReportMetadata {
                analysis_date,
                start_timestamp: recording_start,
                total_duration_seconds,
                num_segments: segments.len(),
                segment_duration_seconds: spec.window_secs,
                step_seconds: spec.step_secs,
                sample_rate_hz: spec.rate_hz,
                simulated,
            },
            summary: ReportSummary {
                overall_stress_level: level.name().to_string(),
                overall_stress_value: level.value(),
                stress_percentage,
                dominant_state,
            },
            statistics,
            segments,
            stress_moments,
        }
    }

    /// Share of segments with `label`, in percent rounded to two decimals.
    pub fn percentage_of(&self, label: StressLabel) -> f64 {
        share_of(&self.statistics, label, self.metadata.num_segments)
    }

    /// Short clinician-facing narrative of the recording.
    pub fn narrative(&self) -> String {
        let minutes = self.metadata.total_duration_seconds as f64 / 60.0;
        let mut text = format!(
            "Recording of {:.1} min ({} segments): stress detected in {:.2}% of segments \
             (overall level {}), dominant state {}.",
            minutes,
            self.metadata.num_segments,
            self.summary.stress_percentage,
            self.summary.overall_stress_level,
            self.summary.dominant_state,
        );

        match self
            .stress_moments
            .iter()
            .max_by_key(|m| m.duration_seconds)
        {
            Some(longest) => text.push_str(&format!(
                " {} stress moment(s); the longest lasted {} s starting at {}.",
                self.stress_moments.len(),
                longest.duration_seconds,
                longest.start_timestamp.format("%H:%M:%S"),
            )),
            None => text.push_str(" No stress moments were detected."),
        }

        text
    }
}

/// Per-label counts and percentages for all five labels.
///
/// Percentages carry two decimals and always sum to exactly 100.00 for a
/// non-empty input (largest-remainder rounding).
pub fn label_statistics(segments: &[SegmentPrediction]) -> Vec<LabelStatistic> {
    let total = segments.len();
    let counts: Vec<usize> = StressLabel::ALL
        .iter()
        .map(|label| segments.iter().filter(|s| s.label_id == label.id()).count())
        .collect();

    let hundredths = apportion_hundredths(&counts, total);

    StressLabel::ALL
        .iter()
        .zip(counts.iter().zip(hundredths))
        .map(|(label, (&count, cents))| LabelStatistic {
            label_id: label.id(),
            label_name: label.name().to_string(),
            count,
            percentage: cents as f64 / 100.0,
        })
        .collect()
}

/// `count / total * 100` for `label`, rounded independently of the
/// apportioned statistics.
fn share_of(statistics: &[LabelStatistic], label: StressLabel, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    statistics
        .iter()
        .find(|s| s.label_id == label.id())
        .map(|s| round2(s.count as f64 / total as f64 * 100.0))
        .unwrap_or(0.0)
}

/// Split 10000 hundredths of a percent across `counts` proportionally.
fn apportion_hundredths(counts: &[usize], total: usize) -> Vec<u64> {
    if total == 0 {
        return vec![0; counts.len()];
    }

    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 * 10_000.0 / total as f64)
        .collect();
    let mut floors: Vec<u64> = exact.iter().map(|e| e.floor() as u64).collect();
    let assigned: u64 = floors.iter().sum();
    let mut leftover = 10_000u64.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });

    for i in order {
        if leftover == 0 {
            break;
        }
        if counts[i] > 0 {
            floors[i] += 1;
            leftover -= 1;
        }
    }

    floors
}

/// Merge index-adjacent stress segments into moments.
///
/// Adjacency is by segment index, not by time gap. A lone stress segment
/// forms a one-segment moment.
pub fn detect_stress_moments(segments: &[SegmentPrediction]) -> Vec<StressMoment> {
    let mut moments = Vec::new();
    let mut run: Vec<&SegmentPrediction> = Vec::new();

    for segment in segments {
        let continues = run
            .last()
            .map(|prev| prev.segment_index + 1 == segment.segment_index)
            .unwrap_or(true);

        if segment.is_stress() && continues {
            run.push(segment);
            continue;
        }

        if let Some(moment) = close_run(&run) {
            moments.push(moment);
        }
        run.clear();
        if segment.is_stress() {
            run.push(segment);
        }
    }

    if let Some(moment) = close_run(&run) {
        moments.push(moment);
    }

    moments
}

fn close_run(run: &[&SegmentPrediction]) -> Option<StressMoment> {
    let first = run.first()?;
    let last = run.last()?;
    let confidence = run.iter().map(|s| s.confidence).sum::<f64>() / run.len() as f64;

    Some(StressMoment {
        start_timestamp: first.start_timestamp,
        end_timestamp: last.end_timestamp,
        duration_seconds: last.end_time_seconds - first.start_time_seconds,
        segment_count: run.len(),
        first_segment_index: first.segment_index,
        last_segment_index: last.segment_index,
        confidence,
    })
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 7, 10, 0, 0).unwrap()
    }

    fn segments(labels: &[StressLabel]) -> Vec<SegmentPrediction> {
        let spec = WindowSpec::default();
        labels
            .iter()
            .enumerate()
            .map(|(i, &l)| SegmentPrediction::new(i, l, 0.9, start(), &spec))
            .collect()
    }

    use StressLabel::{Amusement as A, Baseline as B, Meditation as M, Stress as S};

    #[test]
    fn test_segment_timestamps() {
        let segs = segments(&[B, B, S]);
        assert_eq!(segs[2].start_time_seconds, 20);
        assert_eq!(segs[2].end_time_seconds, 50);
        assert_eq!(
            segs[2].end_timestamp - segs[2].start_timestamp,
            Duration::seconds(30)
        );
        assert_eq!(
            segs[1].start_timestamp - segs[0].start_timestamp,
            Duration::seconds(10)
        );
    }

    #[test]
    fn test_moments_merge_adjacent_runs() {
        let segs = segments(&[B, S, S, S, B, S, M, S, S]);
        let moments = detect_stress_moments(&segs);

        assert_eq!(moments.len(), 3);
        assert_eq!(moments[0].segment_count, 3);
        assert_eq!(moments[0].first_segment_index, 1);
        assert_eq!(moments[0].last_segment_index, 3);
        // 10s..(30s + 30s)
        assert_eq!(moments[0].duration_seconds, 50);
        assert_eq!(moments[1].segment_count, 1);
        assert_eq!(moments[1].duration_seconds, 30);
        assert_eq!(moments[2].segment_count, 2);
    }

    #[test]
    fn test_moments_are_maximal_and_cover_all_stress() {
        let segs = segments(&[S, S, B, S, A, A, S, S, S, B, S]);
        let moments = detect_stress_moments(&segs);

        for pair in moments.windows(2) {
            assert!(pair[0].last_segment_index + 1 < pair[1].first_segment_index);
        }
        let covered: usize = moments.iter().map(|m| m.segment_count).sum();
        let stress = segs.iter().filter(|s| s.is_stress()).count();
        assert_eq!(covered, stress);
    }

    #[test]
    fn test_statistics_sum_to_hundred() {
        let segs = segments(&[B, S, A, M, B, S, S]);
        let stats = label_statistics(&segs);

        assert_eq!(stats.len(), 5);
        let count: usize = stats.iter().map(|s| s.count).sum();
        assert_eq!(count, segs.len());
        let total: f64 = stats.iter().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 0.01);

        // 3/7 = 42.857...
        let stress = stats.iter().find(|s| s.label_id == 2).unwrap();
        assert!((stress.percentage - 42.86).abs() <= 0.01);
    }

    #[test]
    fn test_report_summary() {
        let segs = segments(&[B, S, S, S, B]);
        let report = ClassificationReport::build(
            segs,
            start(),
            start(),
            &WindowSpec::default(),
            &StressThresholds::default(),
            false,
        );

        assert_eq!(report.metadata.num_segments, 5);
        assert_eq!(report.metadata.total_duration_seconds, 70);
        assert_eq!(report.summary.stress_percentage, 60.0);
        assert_eq!(report.summary.overall_stress_level, "Moderate");
        assert_eq!(report.summary.overall_stress_value, 2);
        assert_eq!(report.summary.dominant_state, "stress");
        assert_eq!(report.stress_moments.len(), 1);
        assert!(report.narrative().contains("60.00%"));
    }

    #[test]
    fn test_stress_share_is_not_apportioned() {
        let report = ClassificationReport::build(
            segments(&[S, A, M]),
            start(),
            start(),
            &WindowSpec::default(),
            &StressThresholds::default(),
            false,
        );

        assert_eq!(report.summary.stress_percentage, 33.33);
        assert_eq!(report.percentage_of(StressLabel::Meditation), 33.33);
        assert_eq!(report.summary.overall_stress_level, "Moderate");
        // The statistics list still sums to 100
        let total: f64 = report.statistics.iter().map(|s| s.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistic_ids_match_segment_ids() {
        let segs = segments(&[B, S, M]);
        let stats = label_statistics(&segs);
        for segment in &segs {
            let stat = stats.iter().find(|s| s.label_id == segment.label_id).unwrap();
            assert_eq!(stat.label_name, segment.label_name);
            assert_eq!(stat.count, 1);
        }
    }

    #[test]
    fn test_timestamps_saturate_at_max_date() {
        let late = DateTime::<Utc>::MAX_UTC - Duration::seconds(5);
        let segment = SegmentPrediction::new(0, S, 0.9, late, &WindowSpec::default());
        assert_eq!(segment.start_timestamp, late);
        assert_eq!(segment.end_timestamp, DateTime::<Utc>::MAX_UTC);
        assert!(checked_offset(late, 30).is_none());
        assert_eq!(checked_offset(start(), 10), Some(start() + Duration::seconds(10)));
    }

    #[test]
    fn test_empty_report() {
        let report = ClassificationReport::build(
            Vec::new(),
            start(),
            start(),
            &WindowSpec::default(),
            &StressThresholds::default(),
            false,
        );
        assert_eq!(report.summary.overall_stress_level, "Low");
        assert!(report.stress_moments.is_empty());
        assert!(report.statistics.iter().all(|s| s.percentage == 0.0));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(22.0666), 22.07);
        assert_eq!(round2(0.0), 0.0);
    }
}
