//! Load-once handle around the frozen model.
//!
//! The handle is created at startup and shared by reference (or `Arc`) with
//! every request. The first successful [`ClassifierHandle::load`] installs
//! the model; later calls return immediately. Concurrent first loads are
//! serialized so the artifact is read at most once.

use crate::classifier::model::{LinearSoftmaxModel, Prediction, StressModel};
use crate::classifier::ClassifierError;
use crate::core::features::FeatureVector;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Shared, lazily loaded classifier.
#[derive(Debug)]
pub struct ClassifierHandle {
    path: PathBuf,
    model: OnceLock<Arc<dyn StressModel>>,
    load_lock: Mutex<()>,
}

impl ClassifierHandle {
    /// Handle for the artifact at `path`. Nothing is read until `load`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Handle with an already constructed model.
    pub fn with_model(model: Arc<dyn StressModel>) -> Self {
        let handle = Self::new(PathBuf::new());
        let _ = handle.model.set(model);
        handle
    }

    pub fn model_path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Read the artifact once. Subsequent calls are no-ops.
    ///
    /// A failed load leaves the handle unloaded so the caller may retry.
    pub fn load(&self) -> Result<(), ClassifierError> {
        if self.model.get().is_some() {
            return Ok(());
        }

        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another thread may have finished loading while we waited.
        if self.model.get().is_some() {
            return Ok(());
        }

        if !self.path.exists() {
            tracing::error!(path = %self.path.display(), "Model artifact not found");
            return Err(ClassifierError::ModelFileMissing(self.path.clone()));
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ClassifierError::ModelLoad(format!("failed to read {}: {e}", self.path.display()))
        })?;

        let model = LinearSoftmaxModel::from_json(&json).map_err(|e| {
            tracing::error!(path = %self.path.display(), "Failed to load model: {}", e);
            e
        })?;

        tracing::info!(
            path = %self.path.display(),
            model = model.name(),
            "Stress classification model loaded"
        );

        let _ = self.model.set(Arc::new(model));
        Ok(())
    }

    /// Predict a label for one window. Fails if the model is not loaded.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        self.model
            .get()
            .ok_or(ClassifierError::ModelNotLoaded)?
            .predict(features)
    }
}
