//! Stress Classifier - wearable biosignal stress classification for
//! psychologists.
//!
//! This library turns multi-channel wristband recordings (accelerometer,
//! blood volume pulse, electrodermal activity, skin temperature) into a
//! timeline of affective-state labels, and tracks stress across a patient's
//! visits.
//!
//! # Guarantees
//!
//! - **Whole reports only**: a run either returns a complete report or an error
//! - **Load once**: the model artifact is read at most once per process
//! - **Writes stand**: a failed long-term summary never undoes a visit write
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Stress Classifier                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Request   │──▶│  Windowing  │──▶│ Classifier  │       │
//! │  │ / Simulator │   │ (30s / 10s) │   │  (handle)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Long-term  │◀── visit writes     │   Report    │       │
//! │  │  Summary    │                     │ (segments)  │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stress_classifier::{ClassifierHandle, InferenceRequest, PipelineSettings, StressPipeline};
//! use stress_classifier::core::SimulationConfig;
//!
//! let handle = ClassifierHandle::new("models/stress_model.json");
//! let pipeline = StressPipeline::new(&handle, PipelineSettings::default());
//!
//! let report = pipeline
//!     .classify_request(&InferenceRequest::simulated(), &SimulationConfig::default())
//!     .expect("classification failed");
//! println!("{}", report.narrative());
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod dataset;
pub mod long_term;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use classifier::{ClassifierError, ClassifierHandle, StressModel};
pub use config::{Config, ConfigError};
pub use core::{
    ClassificationError, ClassificationReport, InferenceRequest, MultiChannelSignal,
    PipelineSettings, StressLabel, StressLevel, StressPipeline, ValidationError,
};
pub use dataset::{load_dataset, DatasetError, DatasetView};
pub use long_term::{analyze_long_term_progress, LongTermSummary, VisitHistoryEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
