//! Rendering of OTLP attribute values inside label values

use std::io::{self, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opentelemetry_proto::tonic::common::v1::any_value::Value;

use crate::text::{Number, write_number, write_quoted};

/// Bytes as text when they are valid UTF-8, otherwise as a base64 data URI
fn bytes_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("data;base64,{}", STANDARD.encode(bytes)),
    }
}

fn non_finite_text(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "+Inf"
    } else {
        "-Inf"
    }
}

fn to_json(value: Option<&Value>) -> serde_json::Value {
    let Some(value) = value else {
        return serde_json::Value::Null;
    };

    match value {
        Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::BoolValue(b) => serde_json::Value::Bool(*b),
        Value::IntValue(i) => serde_json::Value::from(*i),
        Value::DoubleValue(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(non_finite_text(*d).to_string())),
        Value::BytesValue(bytes) => serde_json::Value::String(bytes_text(bytes)),
        Value::ArrayValue(array) => serde_json::Value::Array(
            array
                .values
                .iter()
                .map(|v| to_json(v.value.as_ref()))
                .collect(),
        ),
        Value::KvlistValue(list) => serde_json::Value::Object(
            list.values
                .iter()
                .map(|kv| {
                    (
                        kv.key.clone(),
                        to_json(kv.value.as_ref().and_then(|v| v.value.as_ref())),
                    )
                })
                .collect(),
        ),
    }
}

/// Write an attribute value as the contents of a quoted label value
pub(crate) fn write_attribute_value<W: Write + ?Sized>(out: &mut W, value: &Value) -> io::Result<()> {
    match value {
        Value::StringValue(s) => write_quoted(out, s),
        Value::BoolValue(b) => write!(out, "{b}"),
        Value::IntValue(i) => write_number(out, Number::Int(*i)),
        Value::DoubleValue(d) => write_number(out, Number::Float(*d)),
        Value::BytesValue(bytes) => write_quoted(out, &bytes_text(bytes)),
        Value::ArrayValue(_) | Value::KvlistValue(_) => {
            write_quoted(out, &to_json(Some(value)).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::common::v1::{AnyValue, ArrayValue, KeyValue, KeyValueList};

    fn any(value: Value) -> AnyValue {
        AnyValue { value: Some(value) }
    }

    fn render(value: Value) -> String {
        let mut out = Vec::new();
        write_attribute_value(&mut out, &value).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(Value::StringValue("a\"b".into())), "a\\\"b");
        assert_eq!(render(Value::BoolValue(true)), "true");
        assert_eq!(render(Value::IntValue(-7)), "-7");
        assert_eq!(render(Value::DoubleValue(2.0)), "2.0");
        assert_eq!(render(Value::DoubleValue(f64::NAN)), "NaN");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(render(Value::BytesValue(b"plain".to_vec())), "plain");
        assert_eq!(
            render(Value::BytesValue(vec![0xff, 0xfe])),
            "data;base64,//4="
        );
    }

    #[test]
    fn test_array_is_json_escaped() {
        let array = Value::ArrayValue(ArrayValue {
            values: vec![
                any(Value::StringValue("a".into())),
                any(Value::IntValue(1)),
                any(Value::DoubleValue(f64::INFINITY)),
                AnyValue { value: None },
            ],
        });
        assert_eq!(render(array), "[\\\"a\\\",1,\\\"+Inf\\\",null]");
    }

    #[test]
    fn test_map_is_json_escaped() {
        let map = Value::KvlistValue(KeyValueList {
            values: vec![
                KeyValue {
                    key: "b".into(),
                    value: Some(any(Value::BoolValue(false))),
                },
                KeyValue {
                    key: "k".into(),
                    value: Some(any(Value::StringValue("v".into()))),
                },
            ],
        });
        assert_eq!(render(map), "{\\\"b\\\":false,\\\"k\\\":\\\"v\\\"}");
    }
}
