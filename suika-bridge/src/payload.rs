//! JSON payloads served over HTTP.
//!
//! All three are rendered from one immutable [`BridgeState`] so a response
//! never mixes values from two publishes.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use suika_common::SensorSnapshot;

use crate::snapshot::BridgeState;

/// Characters of the last raw record included in the diagnostic payload.
pub const RAW_PREVIEW_CHARS: usize = 200;

/// A sensor value rendered with exactly one fractional digit.
///
/// `/data` writes it as a bare JSON number and `/raw` as a string, both from
/// the same [`Display`](fmt::Display) text, so the two never disagree on
/// rounding and large magnitudes never switch to exponent notation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneDecimal(pub f64);

impl fmt::Display for OneDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl Serialize for OneDecimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // NaN and infinities have no JSON number form.
        if !self.0.is_finite() {
            return serializer.serialize_none();
        }
        let raw = RawValue::from_string(self.to_string()).map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

fn elapsed_since(now_ms: u64, tick_ms: u64) -> u64 {
    now_ms.saturating_sub(tick_ms)
}

/// `GET /data` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsPayload {
    pub cpu_temp: OneDecimal,
    pub cpu_usage: OneDecimal,
    pub gpu_temp: OneDecimal,
    pub gpu_usage: OneDecimal,
    pub ram_usage: OneDecimal,
    pub ram_unit: &'static str,
    pub network_up: OneDecimal,
    pub network_down: OneDecimal,
    /// Uptime in milliseconds.
    pub time: u64,
}

impl MetricsPayload {
    pub fn render(snapshot: &SensorSnapshot, now_ms: u64) -> Self {
        Self {
            cpu_temp: OneDecimal(snapshot.cpu_temp),
            cpu_usage: OneDecimal(snapshot.cpu_usage),
            gpu_temp: OneDecimal(snapshot.gpu_temp),
            gpu_usage: OneDecimal(snapshot.gpu_usage),
            ram_usage: OneDecimal(snapshot.ram_usage),
            ram_unit: "GB",
            network_up: OneDecimal(snapshot.network_up),
            network_down: OneDecimal(snapshot.network_down),
            time: now_ms,
        }
    }
}

/// `GET /status` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub has_valid_data: bool,
    pub last_read_ms: u64,
    pub serial_reads: u64,
    pub parse_attempts: u64,
    pub parse_errors: u64,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub ip: String,
}

impl StatusPayload {
    pub fn render(state: &BridgeState, now_ms: u64, ip: &str) -> Self {
        Self {
            has_valid_data: state.has_valid_data,
            last_read_ms: elapsed_since(now_ms, state.last_read_ms),
            serial_reads: state.counters.frames_seen,
            parse_attempts: state.counters.parse_attempts(),
            parse_errors: state.counters.frames_rejected,
            uptime: now_ms,
            error: state.last_error.clone(),
            ip: ip.to_string(),
        }
    }
}

/// Status block nested in the diagnostic payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStatus {
    pub serial_reads: u64,
    pub parse_attempts: u64,
    pub parse_errors: u64,
    pub last_read_ms: u64,
    pub has_valid_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sensor values as one-decimal strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSensors {
    pub cpu_temp: String,
    pub cpu_usage: String,
    pub gpu_temp: String,
    pub gpu_usage: String,
    pub ram_usage: String,
    pub network_up: String,
    pub network_down: String,
}

/// `GET /raw` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticPayload {
    pub status: DiagnosticStatus,
    pub raw_json: String,
    pub sensors: DiagnosticSensors,
}

impl DiagnosticPayload {
    pub fn render(state: &BridgeState, now_ms: u64) -> Self {
        let s = &state.snapshot;
        Self {
            status: DiagnosticStatus {
                serial_reads: state.counters.frames_seen,
                parse_attempts: state.counters.parse_attempts(),
                parse_errors: state.counters.frames_rejected,
                last_read_ms: elapsed_since(now_ms, state.last_read_ms),
                has_valid_data: state.has_valid_data,
                error: state.last_error.clone(),
            },
            raw_json: state.last_raw.chars().take(RAW_PREVIEW_CHARS).collect(),
            sensors: DiagnosticSensors {
                cpu_temp: OneDecimal(s.cpu_temp).to_string(),
                cpu_usage: OneDecimal(s.cpu_usage).to_string(),
                gpu_temp: OneDecimal(s.gpu_temp).to_string(),
                gpu_usage: OneDecimal(s.gpu_usage).to_string(),
                ram_usage: OneDecimal(s.ram_usage).to_string(),
                network_up: OneDecimal(s.network_up).to_string(),
                network_down: OneDecimal(s.network_down).to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseError;
    use suika_common::SensorCategory;

    fn sample_state() -> BridgeState {
        let mut state = BridgeState::default();
        state.record_read(r#"{"t1":{"v":45.2,"n":"CPU Package"}}"#, 2_000);
        state
            .publish(
                &[
                    (SensorCategory::CpuTemp, 45.2),
                    (SensorCategory::GpuTemp, 60.0),
                    (SensorCategory::RamUsage, 7.86),
                ]
                .into_iter()
                .collect(),
                2_000,
            )
            .unwrap();
        state
    }

    #[test]
    fn test_metrics_json() {
        let state = sample_state();
        let json = serde_json::to_string(&MetricsPayload::render(&state.snapshot, 3_500)).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"cpu_temp":45.2,"cpu_usage":0.0,"gpu_temp":60.0,"gpu_usage":0.0,"#,
                r#""ram_usage":7.9,"ram_unit":"GB","network_up":0.0,"network_down":0.0,"#,
                r#""time":3500}"#
            )
        );
    }

    #[test]
    fn test_status_without_error() {
        let state = sample_state();
        let json =
            serde_json::to_value(StatusPayload::render(&state, 2_750, "192.168.4.1")).unwrap();

        assert_eq!(json["hasValidData"], true);
        assert_eq!(json["lastReadMs"], 750);
        assert_eq!(json["serialReads"], 1);
        assert_eq!(json["parseAttempts"], 1);
        assert_eq!(json["parseErrors"], 0);
        assert_eq!(json["uptime"], 2_750);
        assert_eq!(json["ip"], "192.168.4.1");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_status_with_error() {
        let mut state = sample_state();
        state.record_read("{}", 3_000);
        state.reject(&ParseError::NoData);

        let status = StatusPayload::render(&state, 3_000, "10.0.0.2");
        assert_eq!(status.error.as_deref(), Some("No sensor data in document"));
        assert_eq!(status.serial_reads, 2);
        assert_eq!(status.parse_attempts, 2);
        assert_eq!(status.parse_errors, 1);
        assert_eq!(status.last_read_ms, 0);
    }

    #[test]
    fn test_status_nothing_read_yet() {
        let status = StatusPayload::render(&BridgeState::default(), 9_000, "192.168.4.1");
        assert_eq!(status.last_read_ms, 9_000);
        assert!(!status.has_valid_data);
    }

    #[test]
    fn test_diagnostic_json() {
        let state = sample_state();
        let json = serde_json::to_value(DiagnosticPayload::render(&state, 2_000)).unwrap();

        assert_eq!(json["status"]["serialReads"], 1);
        assert_eq!(json["status"]["hasValidData"], true);
        assert!(json["status"].get("error").is_none());
        assert_eq!(json["rawJson"], r#"{"t1":{"v":45.2,"n":"CPU Package"}}"#);
        assert_eq!(json["sensors"]["cpuTemp"], "45.2");
        assert_eq!(json["sensors"]["gpuTemp"], "60.0");
        assert_eq!(json["sensors"]["ramUsage"], "7.9");
        assert_eq!(json["sensors"]["networkDown"], "0.0");
    }

    #[test]
    fn test_diagnostic_raw_preview_truncated_on_chars() {
        let mut state = BridgeState::default();
        let raw = "é".repeat(300);
        state.record_read(&raw, 0);

        let payload = DiagnosticPayload::render(&state, 0);
        assert_eq!(payload.raw_json.chars().count(), RAW_PREVIEW_CHARS);
    }

    #[test]
    fn test_negative_values_keep_one_decimal() {
        let snapshot = SensorSnapshot {
            cpu_temp: -12.04,
            ..Default::default()
        };
        let json = serde_json::to_string(&MetricsPayload::render(&snapshot, 0)).unwrap();
        assert!(json.starts_with(r#"{"cpu_temp":-12.0,"#));
        assert_eq!(OneDecimal(-12.04).to_string(), "-12.0");
    }

    #[test]
    fn test_metrics_and_diagnostic_round_alike() {
        let mut state = BridgeState::default();
        state
            .publish(
                &[
                    (SensorCategory::CpuUsage, 0.25),
                    (SensorCategory::GpuUsage, 0.35),
                    (SensorCategory::NetworkDown, 2.45),
                ]
                .into_iter()
                .collect(),
                0,
            )
            .unwrap();

        let metrics = serde_json::to_value(MetricsPayload::render(&state.snapshot, 0)).unwrap();
        let diagnostic = DiagnosticPayload::render(&state, 0);

        for (number, text) in [
            (&metrics["cpu_usage"], &diagnostic.sensors.cpu_usage),
            (&metrics["gpu_usage"], &diagnostic.sensors.gpu_usage),
            (&metrics["network_down"], &diagnostic.sensors.network_down),
        ] {
            assert_eq!(number.as_f64(), text.parse::<f64>().ok());
        }
    }

    #[test]
    fn test_large_values_stay_in_decimal_notation() {
        let snapshot = SensorSnapshot {
            network_up: 1e16,
            ..Default::default()
        };
        let json = serde_json::to_string(&MetricsPayload::render(&snapshot, 0)).unwrap();
        assert!(json.contains(r#""network_up":10000000000000000.0,"#));
        assert_eq!(OneDecimal(1e16).to_string(), "10000000000000000.0");
    }

    #[test]
    fn test_non_finite_value_renders_null() {
        let json = serde_json::to_string(&OneDecimal(f64::NAN)).unwrap();
        assert_eq!(json, "null");
    }
}
