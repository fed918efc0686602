//! Feature computation from signal windows.
//!
//! Each window block is `(samples, 6)` with columns laid out as
//! [`WINDOW_CHANNELS`]. Features are simple time-domain statistics per
//! channel plus the accelerometer magnitude and EDA/TEMP trends.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Column layout of a window block.
pub const WINDOW_CHANNELS: [&str; 6] = ["ACC_x", "ACC_y", "ACC_z", "BVP", "EDA", "TEMP"];

/// Names of the feature vector entries, in order.
pub const FEATURE_NAMES: [&str; 30] = [
    "acc_x_mean",
    "acc_x_std",
    "acc_x_min",
    "acc_x_max",
    "acc_y_mean",
    "acc_y_std",
    "acc_y_min",
    "acc_y_max",
    "acc_z_mean",
    "acc_z_std",
    "acc_z_min",
    "acc_z_max",
    "acc_mag_mean",
    "acc_mag_std",
    "acc_mag_min",
    "acc_mag_max",
    "bvp_mean",
    "bvp_std",
    "bvp_min",
    "bvp_max",
    "eda_mean",
    "eda_std",
    "eda_min",
    "eda_max",
    "temp_mean",
    "temp_std",
    "temp_min",
    "temp_max",
    "eda_slope",
    "temp_slope",
];

/// Number of features produced per window.
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Feature vector derived from one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a feature by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.0.get(i).copied())
    }
}

/// Compute the feature vector for a `(samples, 6)` window block.
pub fn compute_features(block: ArrayView2<f64>, rate_hz: f64) -> FeatureVector {
    let mut values = Vec::with_capacity(FEATURE_COUNT);

    for axis in 0..3 {
        let column: Vec<f64> = block.column(axis).to_vec();
        values.extend(summary_stats(&column));
    }

    let magnitude: Vec<f64> = block
        .rows()
        .into_iter()
        .map(|row| (row[0] * row[0] + row[1] * row[1] + row[2] * row[2]).sqrt())
        .collect();
    values.extend(summary_stats(&magnitude));

    for column in 3..6 {
        let samples: Vec<f64> = block.column(column).to_vec();
        values.extend(summary_stats(&samples));
    }

    let eda: Vec<f64> = block.column(4).to_vec();
    let temp: Vec<f64> = block.column(5).to_vec();
    values.push(slope_per_sec(&eda, rate_hz));
    values.push(slope_per_sec(&temp, rate_hz));

    FeatureVector(values)
}

/// Mean, population standard deviation, minimum and maximum.
fn summary_stats(values: &[f64]) -> [f64; 4] {
    if values.is_empty() {
        return [0.0; 4];
    }

    let mean = values.iter().mean();
    let std = if values.len() < 2 {
        0.0
    } else {
        values.iter().population_std_dev()
    };
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    [mean, std, min, max]
}

/// Least-squares slope of `values` against time, in units per second.
fn slope_per_sec(values: &[f64], rate_hz: f64) -> f64 {
    if values.len() < 2 || rate_hz <= 0.0 {
        return 0.0;
    }

    let n = values.len() as f64;
    let t_mean = (n - 1.0) / 2.0 / rate_hz;
    let y_mean = values.iter().sum::<f64>() / n;

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dt = i as f64 / rate_hz - t_mean;
            (num + dt * (y - y_mean), den + dt * dt)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
