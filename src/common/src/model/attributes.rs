//! Helpers for OTLP attribute lists

use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue, any_value};

/// Build a string-valued attribute
pub fn string_attribute(key: impl Into<String>, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.into(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.into())),
        }),
    }
}

/// Look up an attribute by key
pub fn find<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a any_value::Value> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| v.value.as_ref())
}

/// Scalar attribute value rendered as plain text.
///
/// Arrays, maps and bytes have no plain-text form and yield `None`.
pub fn scalar_to_string(value: &any_value::Value) -> Option<String> {
    match value {
        any_value::Value::StringValue(s) => Some(s.clone()),
        any_value::Value::BoolValue(b) => Some(b.to_string()),
        any_value::Value::IntValue(i) => Some(i.to_string()),
        any_value::Value::DoubleValue(d) => Some(d.to_string()),
        _ => None,
    }
}

/// Look up a scalar attribute and render it as text
pub fn find_string(attributes: &[KeyValue], key: &str) -> Option<String> {
    find(attributes, key).and_then(scalar_to_string)
}
