//! Heuristic field classification and unit normalization.
//!
//! Resolution order for a single field:
//!
//! 1. An exact role tag (`cpu_usage`, `gpu_temp`, ...) wins outright.
//! 2. Otherwise the first character of the key decides: `c` CPU usage,
//!    `g` GPU usage, `m` RAM usage, `n` network up, `t` a temperature whose
//!    owner is taken from `"CPU"` / `"GPU"` in the display name.
//! 3. Anything else is unclassified and dropped.
//!
//! Key prefixes cannot tell upload from download, so `n...` always lands in
//! [`SensorCategory::NetworkUp`]. Download throughput is only reachable
//! through the `network_down` role tag.

use std::collections::BTreeMap;

use suika_common::SensorCategory;

use crate::parser::Document;

/// Readings above this are taken to be kelvin.
pub const KELVIN_THRESHOLD: f64 = 150.0;

/// Offset between kelvin and Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Per-category values resolved from one frame.
pub type ClassifiedValues = BTreeMap<SensorCategory, f64>;

/// Resolve a field to a canonical category, or `None` if it is unclassified.
pub fn classify(
    key: &str,
    declared_role: Option<&str>,
    declared_name: Option<&str>,
) -> Option<SensorCategory> {
    if let Some(category) = declared_role.and_then(SensorCategory::from_role) {
        return Some(category);
    }

    match key.chars().next()? {
        'c' => Some(SensorCategory::CpuUsage),
        'g' => Some(SensorCategory::GpuUsage),
        'm' => Some(SensorCategory::RamUsage),
        'n' => Some(SensorCategory::NetworkUp),
        't' => {
            let name = declared_name?;
            if name.contains("CPU") {
                Some(SensorCategory::CpuTemp)
            } else if name.contains("GPU") {
                Some(SensorCategory::GpuTemp)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Convert a temperature reading to Celsius.
///
/// Some sources report kelvin without saying so; nothing above 150 °C is a
/// plausible CPU or GPU reading.
pub fn normalize_temperature(raw: f64) -> f64 {
    if raw > KELVIN_THRESHOLD {
        raw - KELVIN_OFFSET
    } else {
        raw
    }
}

/// Fold `(category, value)` pairs keeping the first value per category.
pub fn first_wins<I>(pairs: I) -> ClassifiedValues
where
    I: IntoIterator<Item = (SensorCategory, f64)>,
{
    let mut values = ClassifiedValues::new();
    for (category, value) in pairs {
        values.entry(category).or_insert(value);
    }
    values
}

/// Classify every field of a document, deduplicate, and normalize temperatures.
pub fn classify_document(document: &Document) -> ClassifiedValues {
    let pairs = document.fields.iter().filter_map(|field| {
        classify(
            &field.key,
            field.declared_role.as_deref(),
            field.declared_name.as_deref(),
        )
        .map(|category| (category, field.value))
    });

    let mut values = first_wins(pairs);
    for (category, value) in values.iter_mut() {
        if category.is_temperature() {
            *value = normalize_temperature(*value);
        }
    }

    tracing::trace!(
        fields = document.len(),
        classified = values.len(),
        "Classified document"
    );

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::parser::parse;

    fn classify_str(input: &str) -> ClassifiedValues {
        classify_document(&parse(&RawFrame::new(input)).unwrap())
    }

    #[test]
    fn test_role_tag_wins_over_key_and_name() {
        assert_eq!(
            classify("c0", Some("gpu_temp"), Some("CPU Package")),
            Some(SensorCategory::GpuTemp)
        );
        assert_eq!(
            classify("zzz", Some("network_down"), None),
            Some(SensorCategory::NetworkDown)
        );
    }

    #[test]
    fn test_every_role_tag() {
        for category in SensorCategory::ALL {
            assert_eq!(classify("x", Some(category.as_str()), None), Some(category));
        }
    }

    #[test]
    fn test_unknown_or_empty_role_falls_back_to_key() {
        assert_eq!(classify("g1", Some(""), None), Some(SensorCategory::GpuUsage));
        assert_eq!(
            classify("m1", Some("memory"), None),
            Some(SensorCategory::RamUsage)
        );
        assert_eq!(classify("x1", Some("Cpu_Usage"), None), None);
    }

    #[test]
    fn test_key_prefix_tier() {
        assert_eq!(classify("cpu", None, None), Some(SensorCategory::CpuUsage));
        assert_eq!(classify("gpu", None, None), Some(SensorCategory::GpuUsage));
        assert_eq!(classify("mem", None, None), Some(SensorCategory::RamUsage));
        assert_eq!(classify("x", None, None), None);
        assert_eq!(classify("", None, None), None);
        // Case sensitive on the key prefix.
        assert_eq!(classify("CPU", None, None), None);
    }

    #[test]
    fn test_network_prefix_always_up() {
        assert_eq!(classify("n0", None, Some("Download")), Some(SensorCategory::NetworkUp));
        assert_eq!(classify("n1", None, Some("Upload")), Some(SensorCategory::NetworkUp));
        assert_eq!(classify("net_rx", None, None), Some(SensorCategory::NetworkUp));
    }

    #[test]
    fn test_temperature_disambiguation() {
        assert_eq!(
            classify("t0", None, Some("CPU Package")),
            Some(SensorCategory::CpuTemp)
        );
        assert_eq!(
            classify("t1", None, Some("GPU Core")),
            Some(SensorCategory::GpuTemp)
        );
        // CPU is checked first.
        assert_eq!(
            classify("t2", None, Some("CPU/GPU shared")),
            Some(SensorCategory::CpuTemp)
        );
        assert_eq!(classify("t3", None, Some("cpu die")), None);
        assert_eq!(classify("t4", None, Some("Motherboard")), None);
        assert_eq!(classify("t5", None, None), None);
    }

    #[test]
    fn test_normalize_temperature() {
        assert_eq!(normalize_temperature(65.0), 65.0);
        assert_eq!(normalize_temperature(150.0), 150.0);
        assert!((normalize_temperature(150.01) - (150.01 - 273.15)).abs() < 1e-9);
        assert!((normalize_temperature(318.15) - 45.0).abs() < 1e-9);
        assert!((normalize_temperature(27315.0) - 27041.85).abs() < 1e-9);
        assert_eq!(normalize_temperature(-10.0), -10.0);
    }

    #[test]
    fn test_first_wins() {
        let values = first_wins([
            (SensorCategory::CpuUsage, 10.0),
            (SensorCategory::RamUsage, 8.0),
            (SensorCategory::CpuUsage, 99.0),
        ]);
        assert_eq!(values.len(), 2);
        assert_eq!(values[&SensorCategory::CpuUsage], 10.0);
        assert_eq!(values[&SensorCategory::RamUsage], 8.0);
    }

    #[test]
    fn test_document_name_fallback() {
        let values = classify_str(
            r#"{"t1":{"v":45.2,"n":"CPU Package","r":""}, "t2":{"v":60.1,"n":"GPU Core"}}"#,
        );
        assert_eq!(values[&SensorCategory::CpuTemp], 45.2);
        assert_eq!(values[&SensorCategory::GpuTemp], 60.1);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_document_first_declared_wins() {
        let values = classify_str(r#"{"c0":{"v":12.0},"c1":{"v":88.0}}"#);
        assert_eq!(values[&SensorCategory::CpuUsage], 12.0);
    }

    #[test]
    fn test_document_earlier_key_guess_beats_later_role_tag() {
        // The key-prefix guess comes first, so the tagged field is ignored.
        let values = classify_str(r#"{"c0":{"v":1.0},"x":{"v":2.0,"r":"cpu_usage"}}"#);
        assert_eq!(values[&SensorCategory::CpuUsage], 1.0);
    }

    #[test]
    fn test_document_kelvin_temperatures_normalized() {
        let values = classify_str(
            r#"{"t0":{"v":318.15,"n":"CPU Die"},"g":{"v":200.0},"t1":{"v":55,"n":"GPU Hot Spot"}}"#,
        );
        assert!((values[&SensorCategory::CpuTemp] - 45.0).abs() < 1e-9);
        assert_eq!(values[&SensorCategory::GpuTemp], 55.0);
        // Usage values are never rescaled.
        assert_eq!(values[&SensorCategory::GpuUsage], 200.0);
    }

    #[test]
    fn test_document_unclassified_dropped() {
        let values = classify_str(r#"{"f0":{"v":1200,"n":"Fan"},"t0":{"v":40,"n":"Chipset"}}"#);
        assert!(values.is_empty());
    }
}
