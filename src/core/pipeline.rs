//! Stress classification pipeline.
//!
//! One run moves a recording through
//! `Received → Windowed → Classified → Reported`. Nothing is retried; any
//! failure aborts the run and no partial report is returned.

use crate::classifier::{ClassifierError, ClassifierHandle};
use crate::core::labels::StressThresholds;
use crate::core::report::{checked_offset, ClassificationReport, SegmentPrediction};
use crate::core::request::{InferenceRequest, SignalSource};
use crate::core::signal::{MultiChannelSignal, SampleRates, ValidationError};
use crate::core::simulator::{simulate, SimulationConfig};
use crate::core::windowing::{ShapeError, Window, WindowSpec, Windower};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Window length in seconds
    pub window_secs: u32,
    /// Step between window starts in seconds
    pub step_secs: u32,
    /// Common rate all channels are resampled to
    pub target_rate_hz: u32,
    /// Stress percentage tiers
    pub thresholds: StressThresholds,
    /// Assumed native rates of request channels
    pub input_rates: SampleRates,
    /// Longest span any channel of a recording may cover, in seconds
    #[serde(default = "default_max_recording_secs")]
    pub max_recording_secs: u32,
}

fn default_max_recording_secs() -> u32 {
    86_400
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let spec = WindowSpec::default();
        Self {
            window_secs: spec.window_secs,
            step_secs: spec.step_secs,
            target_rate_hz: spec.rate_hz,
            thresholds: StressThresholds::default(),
            input_rates: SampleRates::default(),
            max_recording_secs: default_max_recording_secs(),
        }
    }
}

impl PipelineSettings {
    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            window_secs: self.window_secs,
            step_secs: self.step_secs,
            rate_hz: self.target_rate_hz,
        }
    }
}

/// Errors that abort a classification run.
#[derive(Debug)]
pub enum ClassificationError {
    /// Malformed input, user-correctable
    Validation(ValidationError),
    /// Model artifact missing or failed to load
    ModelUnavailable(ClassifierError),
    /// Windowing or inference failed on otherwise valid input
    Inference(String),
}

impl ClassificationError {
    /// Whether the caller sent bad input (4xx) rather than hit a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClassificationError::Validation(_))
    }
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationError::Validation(e) => write!(f, "Validation error: {e}"),
            ClassificationError::ModelUnavailable(e) => write!(f, "Model unavailable: {e}"),
            ClassificationError::Inference(msg) => write!(f, "Classification failed: {msg}"),
        }
    }
}

impl std::error::Error for ClassificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassificationError::Validation(e) => Some(e),
            ClassificationError::ModelUnavailable(e) => Some(e),
            ClassificationError::Inference(_) => None,
        }
    }
}

impl From<ValidationError> for ClassificationError {
    fn from(e: ValidationError) -> Self {
        ClassificationError::Validation(e)
    }
}

impl From<ClassifierError> for ClassificationError {
    fn from(e: ClassifierError) -> Self {
        if e.is_unavailable() {
            ClassificationError::ModelUnavailable(e)
        } else {
            ClassificationError::Inference(e.to_string())
        }
    }
}

impl From<ShapeError> for ClassificationError {
    fn from(e: ShapeError) -> Self {
        ClassificationError::Inference(e.to_string())
    }
}

/// Stage of a run, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Received,
    Windowed,
    Classified,
    Reported,
}

/// Drives windowing, inference and aggregation for one recording at a time.
pub struct StressPipeline<'a> {
    classifier: &'a ClassifierHandle,
    settings: PipelineSettings,
}

impl<'a> StressPipeline<'a> {
    pub fn new(classifier: &'a ClassifierHandle, settings: PipelineSettings) -> Self {
        Self {
            classifier,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Resolve a request (recorded or simulated data) and classify it.
    pub fn classify_request(
        &self,
        request: &InferenceRequest,
        simulation: &SimulationConfig,
    ) -> Result<ClassificationReport, ClassificationError> {
        let now = Utc::now();
        let start = request.start(now)?;

        match request.signal_source(self.settings.input_rates)? {
            SignalSource::Recorded(signal) => {
                tracing::info!("Using recorded sensor data from request");
                self.run(&signal, start, now, false)
            }
            SignalSource::Simulated => {
                tracing::info!("Using simulated sensor data");
                let signal = simulate(simulation)?;
                self.run(&signal, start, now, true)
            }
        }
    }

    /// Classify a recording that starts at `start`.
    pub fn classify(
        &self,
        signal: &MultiChannelSignal,
        start: DateTime<Utc>,
    ) -> Result<ClassificationReport, ClassificationError> {
        self.run(signal, start, Utc::now(), false)
    }

    fn run(
        &self,
        signal: &MultiChannelSignal,
        start: DateTime<Utc>,
        analysis_date: DateTime<Utc>,
        simulated: bool,
    ) -> Result<ClassificationReport, ClassificationError> {
        let spec = self.settings.window_spec();
        let windower = Windower::new(spec)?;
        log_state(RunState::Received, signal.duration_secs());

        // Fail before any windowing work when the model cannot serve.
        self.classifier.load()?;

        let resampled =
            signal.resample(spec.rate_hz as f64, self.settings.max_recording_secs as f64)?;
        let min_len = spec.window_samples();
        if resampled.len() < min_len {
            tracing::warn!(
                samples = resampled.len(),
                required = min_len,
                "Recording shorter than one window, padding with last sample"
            );
        }
        let aligned = resampled.pad_to(min_len);

        let windows = windower.windows(
            aligned.acc.view(),
            aligned.bvp.view(),
            aligned.eda.view(),
            aligned.temp.view(),
        )?;
        log_state(RunState::Windowed, windows.len() as f64);

        let span_secs = windows.last().map(Window::end_offset_secs).unwrap_or(0);
        if checked_offset(start, span_secs).is_none() {
            return Err(ValidationError::new(
                "start_timestamp",
                format!("{start} plus {span_secs} s of recording is past the supported date range"),
            )
            .into());
        }

        let segments = windows
            .iter()
            .map(|window| {
                let prediction = self.classifier.predict(&window.features)?;
                Ok(SegmentPrediction::new(
                    window.index,
                    prediction.label,
                    prediction.confidence,
                    start,
                    &spec,
                ))
            })
            .collect::<Result<Vec<_>, ClassifierError>>()?;
        log_state(RunState::Classified, segments.len() as f64);

        let report = ClassificationReport::build(
            segments,
            start,
            analysis_date,
            &spec,
            &self.settings.thresholds,
            simulated,
        );
        log_state(RunState::Reported, report.summary.stress_percentage);

        tracing::info!(
            segments = report.metadata.num_segments,
            stress_percentage = report.summary.stress_percentage,
            level = %report.summary.overall_stress_level,
            moments = report.stress_moments.len(),
            "Stress classification complete"
        );

        Ok(report)
    }
}

fn log_state(state: RunState, value: f64) {
    match state {
        RunState::Received => tracing::debug!(duration_secs = value, "Run received recording"),
        RunState::Windowed => tracing::debug!(windows = value, "Run windowed"),
        RunState::Classified => tracing::debug!(segments = value, "Run classified"),
        RunState::Reported => tracing::debug!(stress_percentage = value, "Run reported"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::tests::eda_threshold_artifact;
    use crate::classifier::LinearSoftmaxModel;
    use crate::core::labels::StressLabel;
    use crate::core::simulator::{Phase, PhaseKind};
    use std::sync::Arc;

    fn loaded_handle() -> ClassifierHandle {
        let model = LinearSoftmaxModel::from_artifact(eda_threshold_artifact()).unwrap();
        ClassifierHandle::with_model(Arc::new(model))
    }

    fn signal_with_eda(eda: Vec<f64>) -> MultiChannelSignal {
        let n = eda.len();
        MultiChannelSignal::new(
            vec![[0.0, 0.0, 64.0]; n],
            vec![0.0; n],
            eda,
            vec![33.0; n],
            SampleRates::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_stress_run_becomes_moment() {
        let handle = loaded_handle();
        let pipeline = StressPipeline::new(&handle, PipelineSettings::default());

        // 60 s calm, 60 s aroused, 60 s calm at 4 Hz
        let eda: Vec<f64> = (0..720)
            .map(|i| if (240..480).contains(&i) { 7.0 } else { 1.0 })
            .collect();
        let report = pipeline
            .classify(&signal_with_eda(eda), Utc::now())
            .unwrap();

        assert_eq!(report.metadata.num_segments, (720 - 120) / 40 + 1);
        assert_eq!(report.stress_moments.len(), 1);
        let stress = report
            .segments
            .iter()
            .filter(|s| s.label_id == StressLabel::Stress.id())
            .count();
        assert_eq!(report.stress_moments[0].segment_count, stress);
    }

    #[test]
    fn test_unloaded_model_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ClassifierHandle::new(dir.path().join("missing.json"));
        let pipeline = StressPipeline::new(&handle, PipelineSettings::default());

        let err = pipeline
            .classify(&signal_with_eda(vec![1.0; 200]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ClassificationError::ModelUnavailable(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_simulated_request() {
        let handle = loaded_handle();
        let pipeline = StressPipeline::new(&handle, PipelineSettings::default());
        let simulation = SimulationConfig {
            phases: vec![
                Phase::new(PhaseKind::Baseline, 120),
                Phase::new(PhaseKind::Stress, 120),
            ],
            seed: Some(3),
            ..SimulationConfig::default()
        };

        let report = pipeline
            .classify_request(&InferenceRequest::simulated(), &simulation)
            .unwrap();
        assert!(report.metadata.simulated);
        assert_eq!(report.metadata.num_segments, (960 - 120) / 40 + 1);
        assert!(report.summary.stress_percentage > 0.0);
    }

    #[test]
    fn test_recording_past_duration_limit() {
        let handle = loaded_handle();
        let settings = PipelineSettings {
            max_recording_secs: 60,
            ..PipelineSettings::default()
        };
        let pipeline = StressPipeline::new(&handle, settings);

        // 100 s at 4 Hz
        let err = pipeline
            .classify(&signal_with_eda(vec![1.0; 400]), Utc::now())
            .unwrap_err();
        match err {
            ClassificationError::Validation(e) => assert_eq!(e.field, "sample_rates"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_start_near_max_date_is_validation() {
        let handle = loaded_handle();
        let pipeline = StressPipeline::new(&handle, PipelineSettings::default());
        let start = DateTime::<Utc>::MAX_UTC - chrono::Duration::seconds(10);

        let err = pipeline
            .classify(&signal_with_eda(vec![1.0; 200]), start)
            .unwrap_err();
        match err {
            ClassificationError::Validation(e) => assert_eq!(e.field, "start_timestamp"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_timestamp_is_validation() {
        let handle = loaded_handle();
        let pipeline = StressPipeline::new(&handle, PipelineSettings::default());
        let request = InferenceRequest {
            start_timestamp: Some("not a date".to_string()),
            ..InferenceRequest::simulated()
        };
        let err = pipeline
            .classify_request(&request, &SimulationConfig::default())
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
