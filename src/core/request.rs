//! Inference request payload and its conversion into a recording.

use crate::core::signal::{Channel, MultiChannelSignal, SampleRates, ValidationError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a classification request.
///
/// Channel fields are kept as raw JSON so that shape problems are reported
/// against the offending channel rather than as a generic parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    #[serde(default = "default_use_simulation")]
    pub use_simulation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bvp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eda: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<Value>,
    /// ISO-8601 recording start; "now" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<String>,
    /// Native channel rates; pipeline defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rates: Option<SampleRates>,
}

fn default_use_simulation() -> bool {
    true
}

/// Where the recording for a request comes from.
#[derive(Debug, Clone)]
pub enum SignalSource {
    Simulated,
    Recorded(MultiChannelSignal),
}

impl InferenceRequest {
    /// A request that asks for simulated data.
    pub fn simulated() -> Self {
        Self {
            use_simulation: true,
            ..Self::default()
        }
    }

    /// Whether all four channels are present and non-empty.
    pub fn has_all_channels(&self) -> bool {
        [&self.acc, &self.bvp, &self.eda, &self.temp]
            .into_iter()
            .all(|field| match field {
                Some(Value::Array(items)) => !items.is_empty(),
                Some(Value::Null) | None => false,
                Some(_) => true,
            })
    }

    /// Decide the signal source, validating channel shapes for recorded data.
    pub fn signal_source(&self, default_rates: SampleRates) -> Result<SignalSource, ValidationError> {
        if self.use_simulation || !self.has_all_channels() {
            return Ok(SignalSource::Simulated);
        }

        let acc = parse_matrix3(self.acc.as_ref())?;
        let bvp = parse_vector(Channel::Bvp, self.bvp.as_ref())?;
        let eda = parse_vector(Channel::Eda, self.eda.as_ref())?;
        let temp = parse_vector(Channel::Temp, self.temp.as_ref())?;
        let rates = self.sample_rates.unwrap_or(default_rates);

        MultiChannelSignal::from_rows(&acc, bvp, eda, temp, rates).map(SignalSource::Recorded)
    }

    /// Parsed recording start, or `now` when not supplied.
    pub fn start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        match self.start_timestamp.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_timestamp(s),
            _ => Ok(now),
        }
    }
}

/// Parse an ISO-8601 timestamp. Naive timestamps are taken as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    s.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            ValidationError::new(
                "start_timestamp",
                format!("`{s}` is not an ISO-8601 timestamp: {e}"),
            )
        })
}

fn parse_matrix3(value: Option<&Value>) -> Result<Vec<Vec<f64>>, ValidationError> {
    let not_2d = || {
        ValidationError::channel(
            Channel::Acc,
            "must be a 2D array with 3 columns (list of [x, y, z])",
        )
    };

    let rows = value.and_then(Value::as_array).ok_or_else(not_2d)?;
    rows.iter()
        .map(|row| {
            let items = row.as_array().ok_or_else(not_2d)?;
            items
                .iter()
                .map(|v| v.as_f64().ok_or_else(not_2d))
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect()
}

fn parse_vector(channel: Channel, value: Option<&Value>) -> Result<Vec<f64>, ValidationError> {
    let not_1d = || ValidationError::channel(channel, "must be a 1D array of numbers");

    value
        .and_then(Value::as_array)
        .ok_or_else(not_1d)?
        .iter()
        .map(|v| v.as_f64().ok_or_else(not_1d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn request(body: Value) -> InferenceRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_defaults_to_simulation() {
        let req = request(json!({}));
        assert!(req.use_simulation);
        assert!(matches!(
            req.signal_source(SampleRates::default()).unwrap(),
            SignalSource::Simulated
        ));
    }

    #[test]
    fn test_missing_channel_falls_back_to_simulation() {
        let req = request(json!({
            "use_simulation": false,
            "acc": [[0.1, 0.2, 0.3]],
            "bvp": [0.5],
            "eda": [],
            "temp": [36.5]
        }));
        assert!(!req.has_all_channels());
        assert!(matches!(
            req.signal_source(SampleRates::default()).unwrap(),
            SignalSource::Simulated
        ));
    }

    #[test]
    fn test_recorded_channels() {
        let req = request(json!({
            "use_simulation": false,
            "acc": [[0.1, 0.2, 0.3], [0.2, 0.3, 0.4]],
            "bvp": [0.5, 0.6, 0.7],
            "eda": [0.3, 0.4, 0.5],
            "temp": [36.5, 36.6, 36.7]
        }));
        match req.signal_source(SampleRates::default()).unwrap() {
            SignalSource::Recorded(signal) => {
                assert_eq!(signal.acc().len(), 2);
                assert_eq!(signal.bvp().len(), 3);
            }
            SignalSource::Simulated => panic!("expected recorded data"),
        }
    }

    #[test]
    fn test_acc_wrong_columns_names_acc() {
        let req = request(json!({
            "use_simulation": false,
            "acc": [[0.1, 0.2], [0.3, 0.4]],
            "bvp": [0.5, 0.6],
            "eda": [0.3, 0.4],
            "temp": [36.5, 36.6]
        }));
        let err = req.signal_source(SampleRates::default()).unwrap_err();
        assert_eq!(err.field, "acc");
    }

    #[test]
    fn test_flat_acc_is_not_2d() {
        let req = request(json!({
            "use_simulation": false,
            "acc": [0.1, 0.2, 0.3],
            "bvp": [0.5],
            "eda": [0.3],
            "temp": [36.5]
        }));
        let err = req.signal_source(SampleRates::default()).unwrap_err();
        assert_eq!(err.field, "acc");
        assert!(err.message.contains("2D"));
    }

    #[test]
    fn test_nested_bvp_is_not_1d() {
        let req = request(json!({
            "use_simulation": false,
            "acc": [[0.1, 0.2, 0.3]],
            "bvp": [[0.5]],
            "eda": [0.3],
            "temp": [36.5]
        }));
        let err = req.signal_source(SampleRates::default()).unwrap_err();
        assert_eq!(err.field, "bvp");
    }

    #[test]
    fn test_parse_timestamps() {
        let expected = Utc.with_ymd_and_hms(2025, 11, 7, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-11-07T10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-11-07T10:00:00Z").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2025-11-07T11:00:00+01:00").unwrap(),
            expected
        );
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.field, "start_timestamp");
    }

    #[test]
    fn test_start_defaults_to_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(InferenceRequest::simulated().start(now).unwrap(), now);
    }
}
