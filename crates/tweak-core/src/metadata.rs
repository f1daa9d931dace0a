//! Metadata document model: parses a freeform JSON document into per-item
//! editor hints, filling in type-appropriate defaults and validating
//! consistency.
//!
//! `Metadata::parse` takes the raw JSON text and parses it itself via
//! `serde_json::from_str` in a single pass, since there is exactly one
//! caller (`Registry::add`) and no reason to expose the intermediate
//! `serde_json::Value` in this crate's public API.

use crate::value::{Value, ValueType};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Unspecified,
    Checkbox,
    Spinbox,
    Slider,
    Combobox,
    Button,
    Editbox,
    Table,
}

impl ControlKind {
    fn from_str(s: &str) -> Option<ControlKind> {
        Some(match s {
            "unspecified" => ControlKind::Unspecified,
            "checkbox" => ControlKind::Checkbox,
            "spinbox" => ControlKind::Spinbox,
            "slider" => ControlKind::Slider,
            "combobox" => ControlKind::Combobox,
            "button" => ControlKind::Button,
            "editbox" => ControlKind::Editbox,
            "table" => ControlKind::Table,
            _ => return None,
        })
    }

    /// Whether `self` is an admissible editor for a value of data flavor
    /// `flavor`. Invalid combinations cause the parsed `control` field to be
    /// discarded in favor of the type's default.
    fn admissible_for(&self, flavor: DataFlavor) -> bool {
        use ControlKind::*;
        use DataFlavor::*;
        match flavor {
            Boolean => matches!(self, Unspecified | Checkbox | Spinbox | Combobox | Button),
            Integer => matches!(self, Unspecified | Spinbox | Slider | Combobox),
            Float => matches!(self, Unspecified | Slider | Spinbox),
            Str => matches!(self, Unspecified | Editbox),
            Vector => matches!(self, Unspecified | Table),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFlavor {
    Boolean,
    Integer,
    Float,
    Str,
    Vector,
}

fn flavor_of(item_type: ValueType) -> DataFlavor {
    if item_type.is_vector() {
        return DataFlavor::Vector;
    }
    match item_type {
        ValueType::Bool => DataFlavor::Boolean,
        ValueType::String => DataFlavor::Str,
        ValueType::F32 | ValueType::F64 => DataFlavor::Float,
        _ => DataFlavor::Integer,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOrder {
    RowMajor,
    ColumnMajor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub dims: Vec<usize>,
    pub order: LayoutOrder,
}

#[derive(Debug, Clone)]
pub struct OptionEntry {
    pub text: String,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct Metadata {
    pub control: ControlKind,
    pub min: Value,
    pub max: Value,
    pub readonly: bool,
    pub decimals: u32,
    pub step: Value,
    pub caption: String,
    pub unit: String,
    pub options: Option<Vec<OptionEntry>>,
    pub layout: Option<Layout>,
}

impl Metadata {
    /// Builds the type-appropriate defaults row for a freshly added item.
    pub fn defaults(item_type: ValueType, element_count: usize) -> Metadata {
        let elem = item_type.element_type();
        let (control, min, max, decimals, step) = match elem {
            ValueType::Bool => (
                ControlKind::Checkbox,
                Value::new_bool(false),
                Value::new_bool(true),
                0,
                Value::new_bool(false),
            ),
            ValueType::I8 => (ControlKind::Spinbox, Value::new_i8(i8::MIN), Value::new_i8(i8::MAX), 0, Value::new_i8(1)),
            ValueType::I16 => (ControlKind::Spinbox, Value::new_i16(i16::MIN), Value::new_i16(i16::MAX), 0, Value::new_i16(1)),
            ValueType::I32 => (ControlKind::Spinbox, Value::new_i32(i32::MIN), Value::new_i32(i32::MAX), 0, Value::new_i32(1)),
            ValueType::I64 => (ControlKind::Spinbox, Value::new_i64(i64::MIN), Value::new_i64(i64::MAX), 0, Value::new_i64(1)),
            ValueType::U8 => (ControlKind::Spinbox, Value::new_u8(0), Value::new_u8(u8::MAX), 0, Value::new_u8(1)),
            ValueType::U16 => (ControlKind::Spinbox, Value::new_u16(0), Value::new_u16(u16::MAX), 0, Value::new_u16(1)),
            ValueType::U32 => (ControlKind::Spinbox, Value::new_u32(0), Value::new_u32(u32::MAX), 0, Value::new_u32(1)),
            ValueType::U64 => (ControlKind::Spinbox, Value::new_u64(0), Value::new_u64(u64::MAX), 0, Value::new_u64(1)),
            ValueType::F32 => (ControlKind::Slider, Value::new_f32(f32::MIN), Value::new_f32(f32::MAX), 4, Value::new_f32(1e-4)),
            ValueType::F64 => (ControlKind::Slider, Value::new_f64(f64::MIN), Value::new_f64(f64::MAX), 4, Value::new_f64(1e-4)),
            ValueType::String => (
                ControlKind::Editbox,
                Value::new_string(""),
                Value::new_string(""),
                0,
                Value::new_string(""),
            ),
            _ => (ControlKind::Unspecified, Value::Null, Value::Null, 0, Value::Null),
        };
        let control = if item_type.is_vector() { ControlKind::Table } else { control };
        let layout = if item_type.is_vector() {
            Some(Layout { dims: vec![element_count], order: LayoutOrder::RowMajor })
        } else {
            None
        };
        Metadata {
            control,
            min,
            max,
            readonly: false,
            decimals,
            step,
            caption: String::new(),
            unit: String::new(),
            options: None,
            layout,
        }
    }

    /// Parses `json_text` against `item_type`/`element_count`, overriding
    /// the defaults table with whatever fields are present and valid.
    pub fn parse(item_type: ValueType, element_count: usize, json_text: &str) -> Metadata {
        let defaults = Metadata::defaults(item_type, element_count);
        let text = json_text.trim();
        if text.is_empty() {
            return defaults;
        }
        let Ok(Json::Object(obj)) = serde_json::from_str::<Json>(text) else {
            return defaults;
        };

        let elem_type = item_type.element_type();
        let flavor = flavor_of(item_type);
        let mut m = defaults.clone();

        if let Some(Json::Bool(b)) = obj.get("readonly") {
            m.readonly = *b;
        }
        if let Some(Json::String(s)) = obj.get("caption") {
            m.caption = s.clone();
        }
        if let Some(Json::String(s)) = obj.get("unit") {
            m.unit = s.clone();
        }
        if let Some(n) = obj.get("decimals").and_then(Json::as_u64) {
            m.decimals = n as u32;
        }
        if let Some(n) = obj.get("min") {
            if let Some(v) = json_number_to_scalar(n, elem_type) {
                m.min = v;
            }
        }
        if let Some(n) = obj.get("max") {
            if let Some(v) = json_number_to_scalar(n, elem_type) {
                m.max = v;
            }
        }
        if let Some(n) = obj.get("step") {
            if let Some(v) = json_number_to_scalar(n, elem_type) {
                m.step = v;
            }
        }
        if let Some(Json::String(s)) = obj.get("control") {
            if let Some(kind) = ControlKind::from_str(s.to_lowercase().as_str()) {
                if kind.admissible_for(flavor) {
                    m.control = kind;
                }
            }
        }
        if let Some(Json::Object(lay)) = obj.get("layout") {
            if item_type.is_vector() {
                let order = match lay.get("order").and_then(Json::as_str) {
                    Some("column-major") => LayoutOrder::ColumnMajor,
                    _ => LayoutOrder::RowMajor,
                };
                if let Some(Json::Array(dims_json)) = lay.get("dims") {
                    let dims: Option<Vec<usize>> = dims_json
                        .iter()
                        .map(|d| d.as_u64().map(|x| x as usize))
                        .collect();
                    if let Some(dims) = dims {
                        m.layout = Some(Layout { dims, order });
                    }
                } else if let Some(Json::Array(dims_json)) = lay.get("dimensions") {
                    let dims: Option<Vec<usize>> = dims_json
                        .iter()
                        .map(|d| d.as_u64().map(|x| x as usize))
                        .collect();
                    if let Some(dims) = dims {
                        m.layout = Some(Layout { dims, order });
                    }
                }
            }
        }
        if let Some(Json::Array(opts)) = obj.get("options") {
            if let Some(entries) = parse_options(opts, elem_type) {
                m.options = Some(entries);
                m.control = ControlKind::Combobox;
                m.min = Value::Null;
                m.max = Value::Null;
                m.step = Value::Null;
            }
        }

        if item_type.is_vector() {
            let Some(layout) = &m.layout else {
                return defaults;
            };
            // an empty dims array has product 1 by convention, valid only
            // when element_count == 1 (original_source treats this as an
            // edge case of the same product rule, not a special case).
            let product: usize = layout.dims.iter().product();
            if product != element_count {
                return defaults;
            }
        }

        m
    }
}

fn json_number_to_scalar(n: &Json, elem_type: ValueType) -> Option<Value> {
    match elem_type {
        ValueType::Bool => n.as_bool().map(Value::new_bool),
        ValueType::String => n.as_str().map(Value::new_string),
        ValueType::F32 => n.as_f64().map(|f| Value::new_f32(f as f32)),
        ValueType::F64 => n.as_f64().map(Value::new_f64),
        ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64
        | ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64 => {
            let f = n.as_f64()?;
            let (min, max) = elem_type.int_bounds();
            let clamped = f.round().clamp(min as f64, max as f64) as i128;
            Some(int_value_of(elem_type, clamped))
        }
        _ => None,
    }
}

fn int_value_of(ty: ValueType, v: i128) -> Value {
    match ty {
        ValueType::I8 => Value::new_i8(v as i8),
        ValueType::I16 => Value::new_i16(v as i16),
        ValueType::I32 => Value::new_i32(v as i32),
        ValueType::I64 => Value::new_i64(v as i64),
        ValueType::U8 => Value::new_u8(v as u8),
        ValueType::U16 => Value::new_u16(v as u16),
        ValueType::U32 => Value::new_u32(v as u32),
        ValueType::U64 => Value::new_u64(v as u64),
        _ => unreachable!(),
    }
}

/// Parses the `options` array. Each element is either a bare string (text
/// only; value auto-assigned from `last_emitted_value + 1`, starting at the
/// type's zero) or an object `{text, value}` (sets the running counter to
/// `value + 1` for the next implicit element).
fn parse_options(opts: &[Json], elem_type: ValueType) -> Option<Vec<OptionEntry>> {
    let mut out = Vec::with_capacity(opts.len());
    let mut next_implicit: i128 = 0;
    for opt in opts {
        match opt {
            Json::String(text) => {
                let value = int_value_of_checked(elem_type, next_implicit)?;
                out.push(OptionEntry { text: text.clone(), value });
                next_implicit += 1;
            }
            Json::Object(obj) => {
                let text = obj.get("text")?.as_str()?.to_string();
                let value_json = obj.get("value")?;
                let value = json_number_to_scalar(value_json, elem_type)?;
                next_implicit = value_json.as_i64().map(|x| x as i128 + 1).unwrap_or(next_implicit + 1);
                out.push(OptionEntry { text, value });
            }
            _ => return None,
        }
    }
    Some(out)
}

fn int_value_of_checked(ty: ValueType, v: i128) -> Option<Value> {
    match ty {
        ValueType::Bool => Some(Value::new_bool(v != 0)),
        ValueType::F32 => Some(Value::new_f32(v as f32)),
        ValueType::F64 => Some(Value::new_f64(v as f64)),
        ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64
        | ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64 => {
            let (min, max) = ty.int_bounds();
            Some(int_value_of(ty, v.clamp(min, max)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_defaults_match_spec_example() {
        let m = Metadata::parse(ValueType::Bool, 1, "{}");
        assert_eq!(m.control, ControlKind::Checkbox);
        assert!(matches!(m.min, Value::Bool(false)));
        assert!(matches!(m.max, Value::Bool(true)));
        assert!(!m.readonly);
    }

    #[test]
    fn float_overrides_and_step_precision() {
        let m = Metadata::parse(ValueType::F32, 1, r#"{"min":-1,"max":1,"decimals":6}"#);
        assert!(matches!(m.min, Value::F32(x) if x == -1.0));
        assert!(matches!(m.max, Value::F32(x) if x == 1.0));
        assert_eq!(m.decimals, 6);
        assert_eq!(m.control, ControlKind::Slider);
    }

    #[test]
    fn options_force_combobox_and_null_bounds() {
        let m = Metadata::parse(
            ValueType::U8,
            1,
            r#"{"options":[{"value":0,"text":"Err"},"Warn","Info"]}"#,
        );
        assert_eq!(m.control, ControlKind::Combobox);
        assert!(matches!(m.min, Value::Null));
        let opts = m.options.unwrap();
        assert_eq!(opts.len(), 3);
        assert_eq!(opts[0].text, "Err");
        assert!(matches!(opts[0].value, Value::U8(0)));
        assert_eq!(opts[1].text, "Warn");
        assert!(matches!(opts[1].value, Value::U8(1)));
        assert_eq!(opts[2].text, "Info");
        assert!(matches!(opts[2].value, Value::U8(2)));
    }

    #[test]
    fn vector_layout_defaults_to_row_major_full_span() {
        let m = Metadata::defaults(ValueType::VecF32, 6);
        let layout = m.layout.unwrap();
        assert_eq!(layout.dims, vec![6]);
        assert_eq!(layout.order, LayoutOrder::RowMajor);
    }

    #[test]
    fn vector_layout_mismatch_falls_back_to_defaults() {
        let m = Metadata::parse(ValueType::VecF32, 6, r#"{"layout":{"dims":[4,4]}}"#);
        // 4*4=16 != 6, whole metadata must fall back
        let layout = m.layout.unwrap();
        assert_eq!(layout.dims, vec![6]);
    }

    #[test]
    fn vector_layout_accepts_dimensions_alias() {
        let m = Metadata::parse(ValueType::VecF32, 6, r#"{"layout":{"dimensions":[3,2]}}"#);
        let layout = m.layout.unwrap();
        assert_eq!(layout.dims, vec![3, 2]);
    }

    #[test]
    fn invalid_control_for_flavor_is_discarded() {
        let m = Metadata::parse(ValueType::Bool, 1, r#"{"control":"slider"}"#);
        assert_eq!(m.control, ControlKind::Checkbox);
    }

    #[test]
    fn bool_accepts_spinbox_and_combobox() {
        let m = Metadata::parse(ValueType::Bool, 1, r#"{"control":"spinbox"}"#);
        assert_eq!(m.control, ControlKind::Spinbox);
        let m = Metadata::parse(ValueType::Bool, 1, r#"{"control":"combobox"}"#);
        assert_eq!(m.control, ControlKind::Combobox);
    }

    #[test]
    fn float_rejects_combobox() {
        let m = Metadata::parse(ValueType::F32, 1, r#"{"control":"combobox"}"#);
        assert_eq!(m.control, ControlKind::Slider);
    }

    #[test]
    fn integer_rejects_button() {
        let m = Metadata::parse(ValueType::I32, 1, r#"{"control":"button"}"#);
        assert_eq!(m.control, ControlKind::Spinbox);
    }

    #[test]
    fn string_rejects_combobox_and_button() {
        let m = Metadata::parse(ValueType::String, 1, r#"{"control":"combobox"}"#);
        assert_eq!(m.control, ControlKind::Editbox);
        let m = Metadata::parse(ValueType::String, 1, r#"{"control":"button"}"#);
        assert_eq!(m.control, ControlKind::Editbox);
    }

    #[test]
    fn empty_json_text_yields_defaults() {
        let m = Metadata::parse(ValueType::I32, 1, "");
        assert_eq!(m.control, ControlKind::Spinbox);
        assert!(matches!(m.min, Value::I32(i32::MIN)));
    }
}
