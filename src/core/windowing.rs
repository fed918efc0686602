//! Fixed-length, fixed-step windowing of aligned multi-channel signals.
//!
//! With the default 30 s window and 10 s step consecutive windows overlap by
//! 20 s. Window `i` starts at `i * step` seconds and ends at
//! `i * step + window`. A trailing partial window is dropped.

use crate::core::features::{compute_features, FeatureVector, WINDOW_CHANNELS};
use ndarray::{s, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A contiguous slice of the recording used as one classification unit.
#[derive(Debug, Clone)]
pub struct Window {
    /// Position of the window in the recording
    pub index: usize,
    /// Start offset in seconds from the recording start
    pub start_offset_secs: u64,
    /// Window duration in seconds
    pub duration_secs: u64,
    /// `(samples, 6)` block laid out as ACC_x, ACC_y, ACC_z, BVP, EDA, TEMP
    pub samples: Array2<f64>,
    /// Features derived from `samples`
    pub features: FeatureVector,
}

impl Window {
    pub fn end_offset_secs(&self) -> u64 {
        self.start_offset_secs + self.duration_secs
    }
}

/// Windower input disagreement.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Accelerometer block is not `(samples, 3)`
    AccWidth(usize),
    /// Channel lengths differ
    LengthMismatch {
        acc: usize,
        bvp: usize,
        eda: usize,
        temp: usize,
    },
    /// Window or step do not fit the sample grid
    InvalidGeometry(String),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::AccWidth(w) => {
                write!(f, "ACC must have exactly 3 columns per sample, got {w}")
            }
            ShapeError::LengthMismatch {
                acc,
                bvp,
                eda,
                temp,
            } => write!(
                f,
                "channel lengths differ (ACC={acc}, BVP={bvp}, EDA={eda}, TEMP={temp})"
            ),
            ShapeError::InvalidGeometry(msg) => write!(f, "invalid window geometry: {msg}"),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Window configuration for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Window length in seconds
    pub window_secs: u32,
    /// Step between window starts in seconds
    pub step_secs: u32,
    /// Common sampling rate in Hz
    pub rate_hz: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            window_secs: 30,
            step_secs: 10,
            rate_hz: 4,
        }
    }
}

impl WindowSpec {
    pub fn window_samples(&self) -> usize {
        self.window_secs as usize * self.rate_hz as usize
    }

    pub fn step_samples(&self) -> usize {
        self.step_secs as usize * self.rate_hz as usize
    }

    /// Overlap between consecutive windows, in seconds.
    pub fn overlap_secs(&self) -> u32 {
        self.window_secs.saturating_sub(self.step_secs)
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.rate_hz == 0 {
            return Err(ShapeError::InvalidGeometry("rate must be positive".into()));
        }
        if self.window_secs == 0 {
            return Err(ShapeError::InvalidGeometry("window must be positive".into()));
        }
        if self.step_secs == 0 || self.step_secs > self.window_secs {
            return Err(ShapeError::InvalidGeometry(format!(
                "step must be in 1..={} seconds, got {}",
                self.window_secs, self.step_secs
            )));
        }
        Ok(())
    }
}

/// Number of full windows over `samples` aligned samples.
pub fn window_count(samples: usize, spec: &WindowSpec) -> usize {
    let win = spec.window_samples();
    let step = spec.step_samples();
    if win == 0 || step == 0 || samples < win {
        0
    } else {
        (samples - win) / step + 1
    }
}

/// Slices aligned channels into overlapping windows.
#[derive(Debug, Clone, Copy)]
pub struct Windower {
    spec: WindowSpec,
}

impl Windower {
    pub fn new(spec: WindowSpec) -> Result<Self, ShapeError> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Produce windows in time order, each with its feature vector.
    pub fn windows(
        &self,
        acc: ArrayView2<f64>,
        bvp: ArrayView1<f64>,
        eda: ArrayView1<f64>,
        temp: ArrayView1<f64>,
    ) -> Result<Vec<Window>, ShapeError> {
        if acc.ncols() != 3 {
            return Err(ShapeError::AccWidth(acc.ncols()));
        }
        let n = acc.nrows();
        if bvp.len() != n || eda.len() != n || temp.len() != n {
            return Err(ShapeError::LengthMismatch {
                acc: n,
                bvp: bvp.len(),
                eda: eda.len(),
                temp: temp.len(),
            });
        }

        let win = self.spec.window_samples();
        let step = self.spec.step_samples();
        let count = window_count(n, &self.spec);

        let windows = (0..count)
            .map(|index| {
                let lo = index * step;
                let hi = lo + win;

                let mut samples = Array2::<f64>::zeros((win, WINDOW_CHANNELS.len()));
                samples.slice_mut(s![.., 0..3]).assign(&acc.slice(s![lo..hi, ..]));
                samples.column_mut(3).assign(&bvp.slice(s![lo..hi]));
                samples.column_mut(4).assign(&eda.slice(s![lo..hi]));
                samples.column_mut(5).assign(&temp.slice(s![lo..hi]));

                let features = compute_features(samples.view(), self.spec.rate_hz as f64);

                Window {
                    index,
                    start_offset_secs: index as u64 * self.spec.step_secs as u64,
                    duration_secs: self.spec.window_secs as u64,
                    samples,
                    features,
                }
            })
            .collect();

        Ok(windows)
    }
}
