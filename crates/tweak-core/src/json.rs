//! `Value::to_json` and the JSON string-escaping helper it's built on.
//!
//! Hand-rolled rather than routed through `serde_json::Value`, since this
//! is hot-path string building for wire encoding. `serde_json` is still a
//! dependency of this crate — `metadata.rs` uses it to parse the incoming
//! metadata document, where structure matters more than allocation count.

use crate::value::{Value, ValueType};

/// Escapes `s` for embedding inside a JSON string literal: quote,
/// backslash, and control characters below `0x20` become `\uXXXX` (except
/// the common short escapes `\n`, `\r`, `\t`).
pub fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn json_number(v: &Value) -> String {
    match v {
        Value::I8(x) => x.to_string(),
        Value::I16(x) => x.to_string(),
        Value::I32(x) => x.to_string(),
        Value::I64(x) => x.to_string(),
        Value::U8(x) => x.to_string(),
        Value::U16(x) => x.to_string(),
        Value::U32(x) => x.to_string(),
        Value::U64(x) => x.to_string(),
        Value::F32(x) => json_float(*x as f64),
        Value::F64(x) => json_float(*x),
        _ => unreachable!("json_number called on a non-numeric value"),
    }
}

fn json_float(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else if v.is_nan() {
        "NaN".to_string()
    } else if v > 0.0 {
        "Infinity".to_string()
    } else {
        "-Infinity".to_string()
    }
}

impl Value {
    /// Wraps the value as `{"<type_tag>": <value>}` for scalars and
    /// strings, or `{"vector": {"item_type": "<tag>", "items": [...]}}`
    /// for vectors.
    pub fn to_json(&self) -> String {
        match self {
            Value::Null => "{\"null\": null}".to_string(),
            Value::Bool(b) => format!("{{\"bool\": {}}}", b),
            Value::String(s) => {
                format!("{{\"string\": \"{}\"}}", escape_json_string(s.as_str()))
            }
            v if v.value_type().is_vector() => {
                let item_type = v.value_type().element_type().json_tag();
                let items = vector_items_json(v);
                format!(
                    "{{\"vector\": {{\"item_type\": \"{}\", \"items\": [{}]}}}}",
                    item_type, items
                )
            }
            v => format!("{{\"{}\": {}}}", v.value_type().json_tag(), json_number(v)),
        }
    }
}

fn vector_items_json(v: &Value) -> String {
    fn join<T, F: Fn(&T) -> String>(items: &[T], f: F) -> String {
        items.iter().map(|x| f(x)).collect::<Vec<_>>().join(", ")
    }
    match v {
        Value::VecI8(b) => join(b.as_slice(), |x: &i8| x.to_string()),
        Value::VecI16(b) => join(b.as_slice(), |x: &i16| x.to_string()),
        Value::VecI32(b) => join(b.as_slice(), |x: &i32| x.to_string()),
        Value::VecI64(b) => join(b.as_slice(), |x: &i64| x.to_string()),
        Value::VecU8(b) => join(b.as_slice(), |x: &u8| x.to_string()),
        Value::VecU16(b) => join(b.as_slice(), |x: &u16| x.to_string()),
        Value::VecU32(b) => join(b.as_slice(), |x: &u32| x.to_string()),
        Value::VecU64(b) => join(b.as_slice(), |x: &u64| x.to_string()),
        Value::VecF32(b) => join(b.as_slice(), |x: &f32| json_float(*x as f64)),
        Value::VecF64(b) => join(b.as_slice(), |x: &f64| json_float(*x)),
        _ => unreachable!("vector_items_json called on a non-vector value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_json_string("a\nb\tc\"d\\e"), "a\\nb\\tc\\\"d\\\\e");
        assert_eq!(escape_json_string("\u{1}"), "\\u0001");
    }

    #[test]
    fn scalar_to_json_uses_type_tag() {
        assert_eq!(Value::new_bool(true).to_json(), "{\"bool\": true}");
        assert_eq!(Value::new_i32(-5).to_json(), "{\"sint32\": -5}");
        assert_eq!(Value::new_u64(5).to_json(), "{\"uint64\": 5}");
    }

    #[test]
    fn string_to_json_is_escaped() {
        assert_eq!(
            Value::new_string("a\"b").to_json(),
            "{\"string\": \"a\\\"b\"}"
        );
    }

    #[test]
    fn vector_to_json_has_item_type_and_items() {
        let v = Value::new_vec_i32(&[1, 2, 3]);
        assert_eq!(
            v.to_json(),
            "{\"vector\": {\"item_type\": \"sint32\", \"items\": [1, 2, 3]}}"
        );
    }

    #[test]
    fn json_type_tags_match_spec_vocabulary() {
        assert_eq!(ValueType::Bool.json_tag(), "bool");
        assert_eq!(ValueType::I8.json_tag(), "sint8");
        assert_eq!(ValueType::U64.json_tag(), "uint64");
        assert_eq!(ValueType::F32.json_tag(), "float");
        assert_eq!(ValueType::F64.json_tag(), "double");
        assert_eq!(ValueType::String.json_tag(), "string");
    }
}
