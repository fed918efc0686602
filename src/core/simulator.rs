//! Synthetic wristband recordings.
//!
//! Used when a request carries no sensor data. A recording is a sequence of
//! phases (baseline, stress, amusement, meditation), each with its own
//! physiological profile, sampled at wristband rates.

use crate::core::signal::{MultiChannelSignal, SampleRates, ValidationError};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::f64::consts::PI;

/// Affective phase of a simulated protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Baseline,
    Stress,
    Amusement,
    Meditation,
}

/// Physiological profile of a phase.
#[derive(Debug, Clone, Copy)]
struct PhaseProfile {
    heart_rate_bpm: f64,
    bvp_amplitude: f64,
    eda_level: f64,
    /// EDA drift in microsiemens per second over the phase
    eda_drift: f64,
    temp_level: f64,
    /// Accelerometer noise (1/64 g units)
    motion_std: f64,
}

impl PhaseKind {
    fn profile(self) -> PhaseProfile {
        match self {
            PhaseKind::Baseline => PhaseProfile {
                heart_rate_bpm: 70.0,
                bvp_amplitude: 40.0,
                eda_level: 2.0,
                eda_drift: 0.0,
                temp_level: 33.5,
                motion_std: 0.5,
            },
            PhaseKind::Stress => PhaseProfile {
                heart_rate_bpm: 95.0,
                bvp_amplitude: 70.0,
                eda_level: 6.0,
                eda_drift: 0.002,
                temp_level: 32.6,
                motion_std: 1.5,
            },
            PhaseKind::Amusement => PhaseProfile {
                heart_rate_bpm: 80.0,
                bvp_amplitude: 55.0,
                eda_level: 3.5,
                eda_drift: 0.0,
                temp_level: 33.8,
                motion_std: 1.0,
            },
            PhaseKind::Meditation => PhaseProfile {
                heart_rate_bpm: 62.0,
                bvp_amplitude: 30.0,
                eda_level: 1.2,
                eda_drift: -0.0005,
                temp_level: 34.3,
                motion_std: 0.2,
            },
        }
    }
}

/// One phase of a simulated protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub duration_secs: u32,
}

impl Phase {
    pub fn new(kind: PhaseKind, duration_secs: u32) -> Self {
        Self {
            kind,
            duration_secs,
        }
    }
}

/// Simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Protocol phases in order
    pub phases: Vec<Phase>,
    /// Channel rates of the generated recording
    pub rates: SampleRates,
    /// Fixed seed for reproducible output; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    /// A lab-style protocol of roughly 50 minutes.
    fn default() -> Self {
        Self {
            phases: vec![
                Phase::new(PhaseKind::Baseline, 1200),
                Phase::new(PhaseKind::Amusement, 390),
                Phase::new(PhaseKind::Meditation, 420),
                Phase::new(PhaseKind::Stress, 600),
                Phase::new(PhaseKind::Meditation, 420),
            ],
            rates: SampleRates::wristband(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Same protocol with a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_secs as u64).sum()
    }

    /// Phase active at `t` seconds from the start.
    pub fn phase_at(&self, t: f64) -> Option<PhaseKind> {
        let mut end = 0.0;
        for phase in &self.phases {
            end += phase.duration_secs as f64;
            if t < end {
                return Some(phase.kind);
            }
        }
        None
    }
}

/// Generate a recording for the configured protocol.
///
/// Channel lengths are exactly `total_duration * rate` for every channel.
pub fn simulate(config: &SimulationConfig) -> Result<MultiChannelSignal, ValidationError> {
    let total = config.total_duration_secs();
    if total == 0 {
        return Err(ValidationError::new(
            "simulation",
            "protocol must contain at least one phase with a positive duration",
        ));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| ValidationError::new("simulation", e.to_string()))?;
    let mut noise = move |sd: f64| unit.sample(&mut rng) * sd;

    let rates = config.rates;
    let samples = |hz: f64| (total as f64 * hz).round() as usize;
    let profile_at = |t: f64| {
        let mut start = 0.0;
        for phase in &config.phases {
            let end = start + phase.duration_secs as f64;
            if t < end {
                return (phase.kind.profile(), t - start);
            }
            start = end;
        }
        let last = config.phases.last().map(|p| p.kind).unwrap_or(PhaseKind::Baseline);
        (last.profile(), 0.0)
    };

    let acc = (0..samples(rates.acc))
        .map(|i| {
            let (p, _) = profile_at(i as f64 / rates.acc);
            [
                noise(p.motion_std),
                noise(p.motion_std),
                64.0 + noise(p.motion_std),
            ]
        })
        .collect::<Vec<_>>();

    let bvp = (0..samples(rates.bvp))
        .map(|i| {
            let t = i as f64 / rates.bvp;
            let (p, _) = profile_at(t);
            let phase = 2.0 * PI * p.heart_rate_bpm / 60.0 * t;
            p.bvp_amplitude * (phase.sin() + 0.3 * (2.0 * phase).sin())
                + noise(p.bvp_amplitude * 0.05)
        })
        .collect::<Vec<_>>();

    let eda = (0..samples(rates.eda))
        .map(|i| {
            let (p, elapsed) = profile_at(i as f64 / rates.eda);
            (p.eda_level + p.eda_drift * elapsed + noise(0.05)).max(0.0)
        })
        .collect::<Vec<_>>();

    let temp = (0..samples(rates.temp))
        .map(|i| {
            let (p, _) = profile_at(i as f64 / rates.temp);
            p.temp_level + noise(0.02)
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        duration_secs = total,
        phases = config.phases.len(),
        "Generated simulated recording"
    );

    MultiChannelSignal::new(acc, bvp, eda, temp, rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_protocol() -> SimulationConfig {
        SimulationConfig {
            phases: vec![
                Phase::new(PhaseKind::Baseline, 60),
                Phase::new(PhaseKind::Stress, 60),
            ],
            rates: SampleRates::wristband(),
            seed: Some(7),
        }
    }

    #[test]
    fn test_deterministic_lengths() {
        let signal = simulate(&short_protocol()).unwrap();
        assert_eq!(signal.acc().len(), 120 * 32);
        assert_eq!(signal.bvp().len(), 120 * 64);
        assert_eq!(signal.eda().len(), 120 * 4);
        assert_eq!(signal.temp().len(), 120 * 4);
    }

    #[test]
    fn test_seed_reproducible() {
        let a = simulate(&short_protocol()).unwrap();
        let b = simulate(&short_protocol()).unwrap();
        assert_eq!(a.eda(), b.eda());
        assert_eq!(a.acc(), b.acc());
    }

    #[test]
    fn test_phases_distinguishable() {
        let signal = simulate(&short_protocol()).unwrap();
        let eda = signal.eda();
        let baseline: f64 = eda[..240].iter().sum::<f64>() / 240.0;
        let stress: f64 = eda[240..].iter().sum::<f64>() / 240.0;
        assert!(stress > baseline + 2.0);

        let temp = signal.temp();
        let baseline_temp: f64 = temp[..240].iter().sum::<f64>() / 240.0;
        let stress_temp: f64 = temp[240..].iter().sum::<f64>() / 240.0;
        assert!(stress_temp < baseline_temp);
    }

    #[test]
    fn test_empty_protocol_rejected() {
        let config = SimulationConfig {
            phases: Vec::new(),
            ..SimulationConfig::default()
        };
        assert!(simulate(&config).is_err());
    }

    #[test]
    fn test_phase_at() {
        let config = short_protocol();
        assert_eq!(config.phase_at(0.0), Some(PhaseKind::Baseline));
        assert_eq!(config.phase_at(60.0), Some(PhaseKind::Stress));
        assert_eq!(config.phase_at(120.0), None);
    }
}
