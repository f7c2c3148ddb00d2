//! Sensor document parser.
//!
//! A frame is a JSON object whose values are sensor objects:
//!
//! ```text
//! {"c0":{"v":12.5,"n":"CPU Total","r":"cpu_usage"},"t1":{"v":45.2,"n":"CPU Package"}}
//! ```
//!
//! `v` (number) is required for a child to count as a sensor, `n` (display
//! name) and `r` (role tag) are optional. Unknown keys at either level are
//! ignored. Children keep the order in which they appear in the frame.

use serde_json::Value;
use thiserror::Error;

use crate::frame::RawFrame;

/// Reasons a frame is rejected. All of them are recoverable: the previous
/// snapshot stays published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The frame exceeded the configured byte cap.
    #[error("Frame of {len} bytes exceeds {limit} byte limit")]
    Oversized { len: usize, limit: usize },

    /// The frame is not a well-formed JSON object.
    #[error("JSON error: {0}")]
    Malformed(String),

    /// The document is empty or no child carries a value.
    #[error("No sensor data in document")]
    NoData,

    /// Children carry values but none maps to a known category.
    #[error("No classifiable sensor data found")]
    NoClassifiable,
}

/// One sensor child of a parsed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldObservation {
    /// Top-level key of the child object.
    pub key: String,
    /// `r` field, if present and a string.
    pub declared_role: Option<String>,
    /// `n` field, if present and a string.
    pub declared_name: Option<String>,
    /// `v` field.
    pub value: f64,
}

/// A parsed frame: the sensor children in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub fields: Vec<FieldObservation>,
}

impl Document {
    /// Number of sensor children.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the root object had no sensor children.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parse one frame into a [`Document`].
pub fn parse(frame: &RawFrame) -> Result<Document, ParseError> {
    let root: Value =
        serde_json::from_slice(frame.as_bytes()).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let Value::Object(children) = root else {
        return Err(ParseError::Malformed(format!(
            "expected an object, found {}",
            value_kind(&root)
        )));
    };

    let fields: Vec<FieldObservation> = children
        .into_iter()
        .filter_map(|(key, child)| observe(key, child))
        .collect();

    if fields.is_empty() {
        return Err(ParseError::NoData);
    }

    Ok(Document { fields })
}

/// Turn a child into an observation, skipping anything without a numeric `v`.
fn observe(key: String, child: Value) -> Option<FieldObservation> {
    let Value::Object(sensor) = child else {
        return None;
    };

    let value = sensor.get("v")?.as_f64()?;
    let text = |field: &str| sensor.get(field).and_then(Value::as_str).map(str::to_string);

    Some(FieldObservation {
        declared_role: text("r"),
        declared_name: text("n"),
        key,
        value,
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> Result<Document, ParseError> {
        parse(&RawFrame::new(input))
    }

    #[test]
    fn test_parse_sensor_fields() {
        let doc =
            parse_str(r#"{"t1":{"v":45.2,"n":"CPU Package","r":""},"t2":{"v":60.1,"n":"GPU Core"}}"#)
                .unwrap();

        assert_eq!(doc.len(), 2);
        assert_eq!(
            doc.fields[0],
            FieldObservation {
                key: "t1".to_string(),
                declared_role: Some(String::new()),
                declared_name: Some("CPU Package".to_string()),
                value: 45.2,
            }
        );
        assert_eq!(doc.fields[1].key, "t2");
        assert_eq!(doc.fields[1].declared_role, None);
        assert_eq!(doc.fields[1].value, 60.1);
    }

    #[test]
    fn test_declaration_order_preserved() {
        let doc = parse_str(r#"{"z":{"v":1},"a":{"v":2},"m":{"v":3}}"#).unwrap();
        let keys: Vec<_> = doc.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_integer_value_accepted() {
        let doc = parse_str(r#"{"m":{"v":16}}"#).unwrap();
        assert_eq!(doc.fields[0].value, 16.0);
    }

    #[test]
    fn test_child_without_value_skipped() {
        let doc = parse_str(r#"{"c":{"n":"CPU"},"g":{"v":30}}"#).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.fields[0].key, "g");
    }

    #[test]
    fn test_non_numeric_value_skipped() {
        let doc = parse_str(r#"{"c":{"v":"high"},"g":{"v":null},"m":{"v":8.5}}"#).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.fields[0].key, "m");
    }

    #[test]
    fn test_non_object_children_skipped() {
        let doc = parse_str(r#"{"version":3,"host":"pc","c":{"v":5}}"#).unwrap();
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let doc = parse_str(r#"{"c":{"v":5,"unit":"%","min":0,"r":"cpu_usage"}}"#).unwrap();
        assert_eq!(doc.fields[0].declared_role.as_deref(), Some("cpu_usage"));
    }

    #[test]
    fn test_non_string_name_ignored() {
        let doc = parse_str(r#"{"t":{"v":50,"n":7,"r":false}}"#).unwrap();
        assert_eq!(doc.fields[0].declared_name, None);
        assert_eq!(doc.fields[0].declared_role, None);
    }

    #[test]
    fn test_empty_document_is_no_data() {
        assert_eq!(parse_str("{}"), Err(ParseError::NoData));
    }

    #[test]
    fn test_no_valued_children_is_no_data() {
        assert_eq!(
            parse_str(r#"{"c":{"n":"CPU"},"x":[]}"#),
            Err(ParseError::NoData)
        );
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_str(r#"{"c":{"v":1"#).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
        assert!(err.to_string().starts_with("JSON error: "));
    }

    #[test]
    fn test_non_object_root_is_malformed() {
        let err = parse_str("[1,2,3]").unwrap_err();
        assert_eq!(
            err,
            ParseError::Malformed("expected an object, found an array".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = parse(&RawFrame::new(vec![b'{', 0xff, b'}'])).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }
}
