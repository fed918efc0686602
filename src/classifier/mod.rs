//! Classifier adapter.
//!
//! Isolates the model format from the pipeline:
//! - [`StressModel`] is the seam the pipeline predicts through
//! - [`ClassifierHandle`] loads the frozen artifact once per process

mod handle;
pub mod model;

pub use handle::ClassifierHandle;
pub use model::{LinearSoftmaxArtifact, LinearSoftmaxModel, Prediction, StressModel};

use std::path::PathBuf;

/// Classifier errors.
#[derive(Debug)]
pub enum ClassifierError {
    /// Artifact path does not exist at load time
    ModelFileMissing(PathBuf),
    /// Artifact exists but could not be read or parsed
    ModelLoad(String),
    /// `predict` called before a successful `load`
    ModelNotLoaded,
    /// Feature vector does not fit the model
    FeatureMismatch { expected: usize, actual: usize },
    /// Model produced an unusable result
    Inference(String),
}

impl ClassifierError {
    /// Errors that mean the model cannot serve at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ClassifierError::ModelFileMissing(_)
                | ClassifierError::ModelLoad(_)
                | ClassifierError::ModelNotLoaded
        )
    }
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::ModelFileMissing(path) => {
                write!(f, "Model artifact not found: {}", path.display())
            }
            ClassifierError::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            ClassifierError::ModelNotLoaded => write!(f, "Model has not been loaded"),
            ClassifierError::FeatureMismatch { expected, actual } => write!(
                f,
                "Feature vector has {actual} entries, model expects {expected}"
            ),
            ClassifierError::Inference(msg) => write!(f, "Inference error: {msg}"),
        }
    }
}

impl std::error::Error for ClassifierError {}
