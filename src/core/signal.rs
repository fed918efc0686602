//! Multi-channel wearable recordings.
//!
//! A recording holds the four Empatica-style channels (ACC x/y/z, BVP, EDA,
//! TEMP), each captured at its own rate. Before windowing every channel is
//! resampled to the common target rate and truncated to the shortest length.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest native channel rate a recording may declare, in Hz.
pub const MAX_SAMPLE_RATE_HZ: f64 = 1024.0;

/// Sensor channels carried by a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Acc,
    Bvp,
    Eda,
    Temp,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Acc, Channel::Bvp, Channel::Eda, Channel::Temp];

    /// Request field name for this channel.
    pub fn field(self) -> &'static str {
        match self {
            Channel::Acc => "acc",
            Channel::Bvp => "bvp",
            Channel::Eda => "eda",
            Channel::Temp => "temp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Acc => "ACC",
            Channel::Bvp => "BVP",
            Channel::Eda => "EDA",
            Channel::Temp => "TEMP",
        };
        f.write_str(name)
    }
}

/// Malformed or mismatched input, naming the offending field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn channel(channel: Channel, message: impl Into<String>) -> Self {
        Self::new(channel.field(), format!("{channel} {}", message.into()))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Native sampling rate of each channel, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRates {
    pub acc: f64,
    pub bvp: f64,
    pub eda: f64,
    pub temp: f64,
}

impl Default for SampleRates {
    /// Request payloads are expected at the 4 Hz pipeline rate unless stated.
    fn default() -> Self {
        Self::uniform(4.0)
    }
}

impl SampleRates {
    pub fn uniform(hz: f64) -> Self {
        Self {
            acc: hz,
            bvp: hz,
            eda: hz,
            temp: hz,
        }
    }

    /// Empatica E4 wristband rates.
    pub fn wristband() -> Self {
        Self {
            acc: 32.0,
            bvp: 64.0,
            eda: 4.0,
            temp: 4.0,
        }
    }

    pub fn rate(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Acc => self.acc,
            Channel::Bvp => self.bvp,
            Channel::Eda => self.eda,
            Channel::Temp => self.temp,
        }
    }

    /// Every rate must lie in `(0, MAX_SAMPLE_RATE_HZ]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for channel in Channel::ALL {
            let hz = self.rate(channel);
            if !hz.is_finite() || hz <= 0.0 || hz > MAX_SAMPLE_RATE_HZ {
                return Err(ValidationError::new(
                    "sample_rates",
                    format!(
                        "{channel} rate must be in (0, {MAX_SAMPLE_RATE_HZ}] Hz, got {hz}"
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// A captured recording. Channel data is immutable after construction.
#[derive(Debug, Clone)]
pub struct MultiChannelSignal {
    acc: Vec<[f64; 3]>,
    bvp: Vec<f64>,
    eda: Vec<f64>,
    temp: Vec<f64>,
    rates: SampleRates,
}

impl MultiChannelSignal {
    /// Build a recording, rejecting empty channels and non-finite samples.
    pub fn new(
        acc: Vec<[f64; 3]>,
        bvp: Vec<f64>,
        eda: Vec<f64>,
        temp: Vec<f64>,
        rates: SampleRates,
    ) -> Result<Self, ValidationError> {
        rates.validate()?;

        if acc.is_empty() {
            return Err(ValidationError::channel(Channel::Acc, "must not be empty"));
        }
        if acc.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ValidationError::channel(
                Channel::Acc,
                "contains non-finite values",
            ));
        }
        for (channel, values) in [
            (Channel::Bvp, &bvp),
            (Channel::Eda, &eda),
            (Channel::Temp, &temp),
        ] {
            if values.is_empty() {
                return Err(ValidationError::channel(channel, "must not be empty"));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ValidationError::channel(channel, "contains non-finite values"));
            }
        }

        Ok(Self {
            acc,
            bvp,
            eda,
            temp,
            rates,
        })
    }

    /// Build a recording from request-shaped ACC rows.
    ///
    /// Every ACC row must hold exactly three values (x, y, z).
    pub fn from_rows(
        acc_rows: &[Vec<f64>],
        bvp: Vec<f64>,
        eda: Vec<f64>,
        temp: Vec<f64>,
        rates: SampleRates,
    ) -> Result<Self, ValidationError> {
        let mut acc = Vec::with_capacity(acc_rows.len());
        for (i, row) in acc_rows.iter().enumerate() {
            match row.as_slice() {
                [x, y, z] => acc.push([*x, *y, *z]),
                _ => {
                    return Err(ValidationError::channel(
                        Channel::Acc,
                        format!(
                            "must be a 2D array with 3 columns [x, y, z]; row {i} has {} values",
                            row.len()
                        ),
                    ))
                }
            }
        }
        Self::new(acc, bvp, eda, temp, rates)
    }

    pub fn acc(&self) -> &[[f64; 3]] {
        &self.acc
    }

    pub fn bvp(&self) -> &[f64] {
        &self.bvp
    }

    pub fn eda(&self) -> &[f64] {
        &self.eda
    }

    pub fn temp(&self) -> &[f64] {
        &self.temp
    }

    pub fn rates(&self) -> SampleRates {
        self.rates
    }

    /// Recording length in seconds, judged by the shortest channel.
    pub fn duration_secs(&self) -> f64 {
        self.channel_secs()
            .into_iter()
            .map(|(_, secs)| secs)
            .fold(f64::INFINITY, f64::min)
    }

    /// Time spanned by each channel, in seconds.
    pub fn channel_secs(&self) -> [(Channel, f64); 4] {
        [
            (Channel::Acc, self.acc.len() as f64 / self.rates.acc),
            (Channel::Bvp, self.bvp.len() as f64 / self.rates.bvp),
            (Channel::Eda, self.eda.len() as f64 / self.rates.eda),
            (Channel::Temp, self.temp.len() as f64 / self.rates.temp),
        ]
    }

    /// Resample every channel to `target_hz` and truncate to a common length.
    ///
    /// Any channel spanning more than `max_secs` is rejected before any
    /// resampled buffer is allocated.
    pub fn resample(
        &self,
        target_hz: f64,
        max_secs: f64,
    ) -> Result<ResampledSignal, ValidationError> {
        for (channel, secs) in self.channel_secs() {
            if secs > max_secs {
                return Err(ValidationError::new(
                    "sample_rates",
                    format!(
                        "{channel} spans {secs:.0} s at {} Hz, longer than the {max_secs:.0} s limit",
                        self.rates.rate(channel)
                    ),
                ));
            }
        }

        let resample_channel = |channel: Channel, values: &[f64]| {
            resample_linear(values, self.rates.rate(channel), target_hz).ok_or_else(|| {
                ValidationError::new(
                    "sample_rates",
                    format!("{channel} cannot be resampled to {target_hz} Hz"),
                )
            })
        };

        let acc_axes: Vec<Vec<f64>> = (0..3)
            .map(|axis| {
                let column: Vec<f64> = self.acc.iter().map(|s| s[axis]).collect();
                resample_channel(Channel::Acc, &column)
            })
            .collect::<Result<_, _>>()?;
        let bvp = resample_channel(Channel::Bvp, &self.bvp)?;
        let eda = resample_channel(Channel::Eda, &self.eda)?;
        let temp = resample_channel(Channel::Temp, &self.temp)?;

        let len = acc_axes
            .iter()
            .map(Vec::len)
            .chain([bvp.len(), eda.len(), temp.len()])
            .min()
            .unwrap_or(0);

        let acc = Array2::from_shape_fn((len, 3), |(i, axis)| acc_axes[axis][i]);

        Ok(ResampledSignal {
            acc,
            bvp: Array1::from_iter(bvp.into_iter().take(len)),
            eda: Array1::from_iter(eda.into_iter().take(len)),
            temp: Array1::from_iter(temp.into_iter().take(len)),
            rate_hz: target_hz,
        })
    }
}

/// Channels sampled at one common rate and of equal length.
#[derive(Debug, Clone)]
pub struct ResampledSignal {
    /// (samples, 3) accelerometer block
    pub acc: Array2<f64>,
    pub bvp: Array1<f64>,
    pub eda: Array1<f64>,
    pub temp: Array1<f64>,
    pub rate_hz: f64,
}

impl ResampledSignal {
    pub fn len(&self) -> usize {
        self.bvp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extend every channel to at least `min_len` samples by repeating its
    /// last value. Returns `self` untouched when already long enough.
    pub fn pad_to(self, min_len: usize) -> Self {
        let len = self.len();
        if len >= min_len || len == 0 {
            return self;
        }

        let acc = Array2::from_shape_fn((min_len, 3), |(i, axis)| {
            self.acc[[i.min(len - 1), axis]]
        });
        let extend = |values: &Array1<f64>| {
            Array1::from_shape_fn(min_len, |i| values[i.min(len - 1)])
        };

        Self {
            bvp: extend(&self.bvp),
            eda: extend(&self.eda),
            temp: extend(&self.temp),
            acc,
            rate_hz: self.rate_hz,
        }
    }
}

/// Linearly interpolate `values` sampled at `from_hz` onto a `to_hz` grid.
///
/// The output covers the same time span: `floor(len * to_hz / from_hz)`
/// samples, never fewer than one for non-empty input. Returns `None` when
/// that length is not finite or exceeds `u32::MAX` samples.
pub fn resample_linear(values: &[f64], from_hz: f64, to_hz: f64) -> Option<Vec<f64>> {
    if values.is_empty() {
        return Some(Vec::new());
    }
    if (from_hz - to_hz).abs() < f64::EPSILON {
        return Some(values.to_vec());
    }

    let exact_len = (values.len() as f64 * to_hz / from_hz).floor();
    if !exact_len.is_finite() || exact_len > u32::MAX as f64 {
        return None;
    }
    let out_len = (exact_len as usize).max(1);
    let last = values.len() - 1;

    let resampled = (0..out_len)
        .map(|i| {
            let pos = i as f64 * from_hz / to_hz;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = pos - lo as f64;
            values[lo] + (values[hi] - values[lo]) * frac.clamp(0.0, 1.0)
        })
        .collect();
    Some(resampled)
}
