//! Pre-processed dataset reader.
//!
//! Reads an `.npz` archive holding `X` with shape `(segments, points, 6)`
//! (channels ACC_x, ACC_y, ACC_z, BVP, EDA, TEMP) and `Y` with one integer
//! label per segment, and reshapes it into a chart-friendly view on the same
//! window/step/rate grid the pipeline uses.

use crate::core::features::WINDOW_CHANNELS;
use crate::core::labels::{label_name, LabelId};
use crate::core::report::LabelStatistic;
use crate::core::windowing::WindowSpec;
use ndarray::{Array1, Array3, Ix1, Ix3, OwnedRepr};
use ndarray_npy::NpzReader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Dataset errors.
#[derive(Debug)]
pub enum DatasetError {
    /// The archive does not exist
    NotFound(PathBuf),
    /// The archive could not be opened or decoded
    Read(String),
    /// Arrays are present but have unexpected shapes
    Shape(String),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::NotFound(path) => write!(f, "File not found: {}", path.display()),
            DatasetError::Read(msg) => write!(f, "Read error: {msg}"),
            DatasetError::Shape(msg) => write!(f, "Shape error: {msg}"),
        }
    }
}

impl std::error::Error for DatasetError {}

/// Segmented signals and their labels.
#[derive(Debug, Clone)]
pub struct ProcessedDataset {
    /// (segments, points, 6)
    pub x: Array3<f64>,
    /// (segments,)
    pub y: Array1<LabelId>,
}

/// Signals flattened per channel along a global time axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSignals {
    pub time: Vec<f64>,
    #[serde(rename = "ACC_x")]
    pub acc_x: Vec<f64>,
    #[serde(rename = "ACC_y")]
    pub acc_y: Vec<f64>,
    #[serde(rename = "ACC_z")]
    pub acc_z: Vec<f64>,
    #[serde(rename = "BVP")]
    pub bvp: Vec<f64>,
    #[serde(rename = "EDA")]
    pub eda: Vec<f64>,
    #[serde(rename = "TEMP")]
    pub temp: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSegmentLabel {
    pub segment_index: usize,
    pub label_id: LabelId,
    pub label_name: String,
    pub start_time_seconds: u64,
    pub end_time_seconds: u64,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub num_segments: usize,
    pub segment_duration_seconds: u32,
    pub step_seconds: u32,
    pub sample_rate_hz: u32,
    pub points_per_segment: usize,
    pub total_duration_seconds: u64,
    pub total_points: usize,
}

/// Chart view of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetView {
    pub signals: DatasetSignals,
    pub labels: Vec<DatasetSegmentLabel>,
    pub label_statistics: Vec<LabelStatistic>,
    pub metadata: DatasetMetadata,
}

/// Load `X` and `Y` from an `.npz` archive.
pub fn load_dataset(path: &Path) -> Result<ProcessedDataset, DatasetError> {
    if !path.exists() {
        return Err(DatasetError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)
        .map_err(|e| DatasetError::Read(format!("failed to open {}: {e}", path.display())))?;
    let mut npz = NpzReader::new(file)
        .map_err(|e| DatasetError::Read(format!("failed to read {}: {e}", path.display())))?;

    let x = read_signals(&mut npz)?;
    let y = read_labels(&mut npz)?;

    let dataset = ProcessedDataset { x, y };
    dataset.validate()?;

    tracing::info!(
        path = %path.display(),
        segments = dataset.num_segments(),
        "Loaded pre-processed dataset"
    );

    Ok(dataset)
}

/// Names an array may be stored under inside the archive.
fn entry_names(name: &str) -> [String; 2] {
    [name.to_string(), format!("{name}.npy")]
}

fn read_signals(npz: &mut NpzReader<File>) -> Result<Array3<f64>, DatasetError> {
    let mut attempts = Vec::new();
    for entry in entry_names("X") {
        match npz.by_name::<OwnedRepr<f64>, Ix3>(&entry) {
            Ok(x) => return Ok(x),
            Err(e) => attempts.push(format!("{entry} as f64: {e}")),
        }
        match npz.by_name::<OwnedRepr<f32>, Ix3>(&entry) {
            Ok(x) => return Ok(x.mapv(f64::from)),
            Err(e) => attempts.push(format!("{entry} as f32: {e}")),
        }
    }
    Err(DatasetError::Read(format!(
        "cannot read `X` ({})",
        attempts.join("; ")
    )))
}

fn read_labels(npz: &mut NpzReader<File>) -> Result<Array1<LabelId>, DatasetError> {
    let mut attempts = Vec::new();
    for entry in entry_names("Y") {
        match npz.by_name::<OwnedRepr<i64>, Ix1>(&entry) {
            Ok(y) => return Ok(y),
            Err(e) => attempts.push(format!("{entry} as i64: {e}")),
        }
        match npz.by_name::<OwnedRepr<i32>, Ix1>(&entry) {
            Ok(y) => return Ok(y.mapv(LabelId::from)),
            Err(e) => attempts.push(format!("{entry} as i32: {e}")),
        }
        match npz.by_name::<OwnedRepr<u8>, Ix1>(&entry) {
            Ok(y) => return Ok(y.mapv(LabelId::from)),
            Err(e) => attempts.push(format!("{entry} as u8: {e}")),
        }
    }
    Err(DatasetError::Read(format!(
        "cannot read `Y` ({})",
        attempts.join("; ")
    )))
}

impl ProcessedDataset {
    pub fn num_segments(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn points_per_segment(&self) -> usize {
        self.x.shape()[1]
    }

    fn validate(&self) -> Result<(), DatasetError> {
        let shape = self.x.shape();
        if shape[2] != WINDOW_CHANNELS.len() {
            return Err(DatasetError::Shape(format!(
                "expected X of shape (segments, points, {}), got {:?}",
                WINDOW_CHANNELS.len(),
                shape
            )));
        }
        if self.y.len() != shape[0] {
            return Err(DatasetError::Shape(format!(
                "X has {} segments but Y has {} labels",
                shape[0],
                self.y.len()
            )));
        }
        Ok(())
    }

    /// Reshape into the chart view on the given window grid.
    pub fn to_view(&self, spec: &WindowSpec) -> DatasetView {
        let segments = self.num_segments();
        let points = self.points_per_segment();
        let window = spec.window_secs as f64;

        // linspace(0, window, points)
        let local_time: Vec<f64> = match points {
            0 => Vec::new(),
            1 => vec![0.0],
            n => (0..n).map(|j| j as f64 * window / (n - 1) as f64).collect(),
        };

        let mut time = Vec::with_capacity(segments * points);
        let mut channels: [Vec<f64>; 6] = Default::default();
        for c in channels.iter_mut() {
            c.reserve(segments * points);
        }

        for i in 0..segments {
            let offset = (i as u64 * spec.step_secs as u64) as f64;
            time.extend(local_time.iter().map(|t| offset + t));
            for (c, values) in channels.iter_mut().enumerate() {
                values.extend(self.x.slice(ndarray::s![i, .., c]).iter().copied());
            }
        }

        let labels = self
            .y
            .iter()
            .enumerate()
            .map(|(i, &label_id)| {
                let start = i as u64 * spec.step_secs as u64;
                DatasetSegmentLabel {
                    segment_index: i,
                    label_id,
                    label_name: label_name(label_id),
                    start_time_seconds: start,
                    end_time_seconds: start + spec.window_secs as u64,
                    duration_seconds: spec.window_secs as u64,
                }
            })
            .collect();

        let mut counts: BTreeMap<LabelId, usize> = BTreeMap::new();
        for &label in self.y.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }
        let label_statistics = counts
            .into_iter()
            .map(|(label_id, count)| LabelStatistic {
                label_id,
                label_name: label_name(label_id),
                count,
                percentage: count as f64 / segments as f64 * 100.0,
            })
            .collect();

        let total_points = time.len();
        let [acc_x, acc_y, acc_z, bvp, eda, temp] = channels;

        DatasetView {
            signals: DatasetSignals {
                time,
                acc_x,
                acc_y,
                acc_z,
                bvp,
                eda,
                temp,
            },
            labels,
            label_statistics,
            metadata: DatasetMetadata {
                num_segments: segments,
                segment_duration_seconds: spec.window_secs,
                step_seconds: spec.step_secs,
                sample_rate_hz: spec.rate_hz,
                points_per_segment: points,
                total_duration_seconds: segments as u64 * spec.step_secs as u64,
                total_points,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(labels: &[LabelId]) -> ProcessedDataset {
        let n = labels.len();
        ProcessedDataset {
            x: Array3::from_shape_fn((n, 120, 6), |(s, p, c)| (s * 1000 + p * 10 + c) as f64),
            y: Array1::from_vec(labels.to_vec()),
        }
    }

    #[test]
    fn test_view_time_axis() {
        let view = dataset(&[1, 1, 2]).to_view(&WindowSpec::default());

        assert_eq!(view.signals.time.len(), 3 * 120);
        assert_eq!(view.signals.time[0], 0.0);
        assert!((view.signals.time[119] - 30.0).abs() < 1e-9);
        assert_eq!(view.signals.time[120], 10.0);
        assert_eq!(view.metadata.total_points, 360);
        assert_eq!(view.metadata.total_duration_seconds, 30);
    }

    #[test]
    fn test_view_channel_mapping() {
        let view = dataset(&[1, 2]).to_view(&WindowSpec::default());
        // segment 1, point 0, channel 4 (EDA)
        assert_eq!(view.signals.eda[120], 1004.0);
        assert_eq!(view.signals.acc_x[1], 10.0);
        assert_eq!(view.signals.temp[0], 5.0);
    }

    #[test]
    fn test_view_labels_and_statistics() {
        let view = dataset(&[1, 2, 2, 9]).to_view(&WindowSpec::default());

        assert_eq!(view.labels[2].start_time_seconds, 20);
        assert_eq!(view.labels[2].end_time_seconds, 50);
        assert_eq!(view.labels[3].label_name, "unknown_9");

        assert_eq!(view.label_statistics.len(), 3);
        assert_eq!(view.label_statistics[1].label_id, 2);
        assert_eq!(view.label_statistics[1].count, 2);
        assert_eq!(view.label_statistics[1].percentage, 50.0);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_dataset(Path::new("/definitely/not/here.npz")).unwrap_err();
        assert!(matches!(err, DatasetError::NotFound(_)));
    }

    #[test]
    fn test_validate_rejects_label_mismatch() {
        let mut ds = dataset(&[1, 2]);
        ds.y = Array1::from_vec(vec![1]);
        assert!(matches!(ds.validate(), Err(DatasetError::Shape(_))));
    }
}
