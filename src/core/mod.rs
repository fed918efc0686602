//! Core functionality for the stress classifier.
//!
//! This module contains:
//! - Multi-channel recordings, validation and resampling
//! - Sliding-window segmentation and per-window features
//! - Synthetic wristband data
//! - The classification pipeline and its report

pub mod features;
pub mod labels;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod signal;
pub mod simulator;
pub mod windowing;

// Re-export commonly used types
pub use features::{compute_features, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use labels::{label_name, LabelId, StressLabel, StressLevel, StressThresholds};
pub use pipeline::{ClassificationError, PipelineSettings, StressPipeline};
pub use report::{
    ClassificationReport, LabelStatistic, ReportMetadata, ReportSummary, SegmentPrediction,
    StressMoment,
};
pub use request::{InferenceRequest, SignalSource};
pub use signal::{Channel, MultiChannelSignal, ResampledSignal, SampleRates, ValidationError};
pub use simulator::{simulate, Phase, PhaseKind, SimulationConfig};
pub use windowing::{ShapeError, Window, WindowSpec, Windower};
