//! The tagged variant value model.
//!
//! `Value` is a plain safe Rust sum type, one doc comment per variant
//! grouped by kind: no `#[repr(C)]`, no FFI concerns, no unsafe
//! `Send`/`Sync` impls, because nothing here crosses a language boundary.

use crate::error::ConvResult;
use crate::owned_buffer::{
    F32Buffer, F64Buffer, I16Buffer, I32Buffer, I64Buffer, I8Buffer, OwnedBuffer, U16Buffer,
    U32Buffer, U64Buffer, U8Buffer,
};
use crate::owned_string::OwnedString;
use std::fmt;

/// Discriminant of a `Value`, independent of its payload. Used by the
/// Registry to enforce invariant I3 (an item's type never changes) and by
/// Metadata to look up per-type defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    VecI8,
    VecI16,
    VecI32,
    VecI64,
    VecU8,
    VecU16,
    VecU32,
    VecU64,
    VecF32,
    VecF64,
}

impl ValueType {
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            ValueType::VecI8
                | ValueType::VecI16
                | ValueType::VecI32
                | ValueType::VecI64
                | ValueType::VecU8
                | ValueType::VecU16
                | ValueType::VecU32
                | ValueType::VecU64
                | ValueType::VecF32
                | ValueType::VecF64
        )
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueType::Null | ValueType::Bool | ValueType::String) && !self.is_vector()
    }

    /// The scalar element type carried by a vector variant, or `self` if
    /// `self` is already scalar.
    pub fn element_type(&self) -> ValueType {
        match self {
            ValueType::VecI8 => ValueType::I8,
            ValueType::VecI16 => ValueType::I16,
            ValueType::VecI32 => ValueType::I32,
            ValueType::VecI64 => ValueType::I64,
            ValueType::VecU8 => ValueType::U8,
            ValueType::VecU16 => ValueType::U16,
            ValueType::VecU32 => ValueType::U32,
            ValueType::VecU64 => ValueType::U64,
            ValueType::VecF32 => ValueType::F32,
            ValueType::VecF64 => ValueType::F64,
            other => *other,
        }
    }

    /// The lowercase JSON type tag used by `to_json`/`from_json`
    /// (`bool`, `sint8`, ... `double`, `string`).
    pub fn json_tag(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::I8 => "sint8",
            ValueType::I16 => "sint16",
            ValueType::I32 => "sint32",
            ValueType::I64 => "sint64",
            ValueType::U8 => "uint8",
            ValueType::U16 => "uint16",
            ValueType::U32 => "uint32",
            ValueType::U64 => "uint64",
            ValueType::F32 => "float",
            ValueType::F64 => "double",
            ValueType::String => "string",
            v if v.is_vector() => "vector",
            _ => unreachable!(),
        }
    }

    /// `(min, max)` as i128, valid for integer scalar types only.
    pub(crate) fn int_bounds(&self) -> (i128, i128) {
        match self {
            ValueType::I8 => (i8::MIN as i128, i8::MAX as i128),
            ValueType::I16 => (i16::MIN as i128, i16::MAX as i128),
            ValueType::I32 => (i32::MIN as i128, i32::MAX as i128),
            ValueType::I64 => (i64::MIN as i128, i64::MAX as i128),
            ValueType::U8 => (u8::MIN as i128, u8::MAX as i128),
            ValueType::U16 => (u16::MIN as i128, u16::MAX as i128),
            ValueType::U32 => (u32::MIN as i128, u32::MAX as i128),
            ValueType::U64 => (u64::MIN as i128, u64::MAX as i128),
            _ => (0, 0),
        }
    }
}

/// Tagged variant value. 21 inhabited non-`Null` variants plus `Null`.
#[derive(Debug, Clone)]
pub enum Value {
    /// Represents absence. `is_equal(Null, Null)` is false (see §9 Open
    /// Questions): Null models "no value here", not a value of its own.
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(OwnedString),
    VecI8(I8Buffer),
    VecI16(I16Buffer),
    VecI32(I32Buffer),
    VecI64(I64Buffer),
    VecU8(U8Buffer),
    VecU16(U16Buffer),
    VecU32(U32Buffer),
    VecU64(U64Buffer),
    VecF32(F32Buffer),
    VecF64(F64Buffer),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn new_bool(x: bool) -> Self {
        Value::Bool(x)
    }
    pub fn new_i8(x: i8) -> Self {
        Value::I8(x)
    }
    pub fn new_i16(x: i16) -> Self {
        Value::I16(x)
    }
    pub fn new_i32(x: i32) -> Self {
        Value::I32(x)
    }
    pub fn new_i64(x: i64) -> Self {
        Value::I64(x)
    }
    pub fn new_u8(x: u8) -> Self {
        Value::U8(x)
    }
    pub fn new_u16(x: u16) -> Self {
        Value::U16(x)
    }
    pub fn new_u32(x: u32) -> Self {
        Value::U32(x)
    }
    pub fn new_u64(x: u64) -> Self {
        Value::U64(x)
    }
    pub fn new_f32(x: f32) -> Self {
        Value::F32(x)
    }
    pub fn new_f64(x: f64) -> Self {
        Value::F64(x)
    }
    pub fn new_string(s: &str) -> Self {
        Value::String(OwnedString::from_str(s))
    }

    pub fn new_vec_i8(s: &[i8]) -> Self {
        Value::VecI8(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_i16(s: &[i16]) -> Self {
        Value::VecI16(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_i32(s: &[i32]) -> Self {
        Value::VecI32(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_i64(s: &[i64]) -> Self {
        Value::VecI64(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_u8(s: &[u8]) -> Self {
        Value::VecU8(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_u16(s: &[u16]) -> Self {
        Value::VecU16(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_u32(s: &[u32]) -> Self {
        Value::VecU32(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_u64(s: &[u64]) -> Self {
        Value::VecU64(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_f32(s: &[f32]) -> Self {
        Value::VecF32(OwnedBuffer::from_slice(s))
    }
    pub fn new_vec_f64(s: &[f64]) -> Self {
        Value::VecF64(OwnedBuffer::from_slice(s))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::I8(_) => ValueType::I8,
            Value::I16(_) => ValueType::I16,
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::U8(_) => ValueType::U8,
            Value::U16(_) => ValueType::U16,
            Value::U32(_) => ValueType::U32,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::String(_) => ValueType::String,
            Value::VecI8(_) => ValueType::VecI8,
            Value::VecI16(_) => ValueType::VecI16,
            Value::VecI32(_) => ValueType::VecI32,
            Value::VecI64(_) => ValueType::VecI64,
            Value::VecU8(_) => ValueType::VecU8,
            Value::VecU16(_) => ValueType::VecU16,
            Value::VecU32(_) => ValueType::VecU32,
            Value::VecU64(_) => ValueType::VecU64,
            Value::VecF32(_) => ValueType::VecF32,
            Value::VecF64(_) => ValueType::VecF64,
        }
    }

    /// Releases any heap storage and sets `self` to `Null`. `Drop` already
    /// does the freeing; this is a thin, explicitly named wrapper for callers
    /// that want to reset a value in place without dropping the binding.
    pub fn destroy(&mut self) {
        *self = Value::Null;
    }

    /// Deep copy. Scalar variants never touch the heap; `String`/`Vec<T>`
    /// clone their backing storage (invariant V2).
    pub fn copy(&self) -> Value {
        self.clone()
    }

    /// Exchanges the two values bit-for-bit; never allocates (invariant
    /// V3's "moving leaves the source Null" is the caller's responsibility:
    /// `swap(a, &mut Value::Null)` is the move idiom).
    pub fn swap(a: &mut Value, b: &mut Value) {
        std::mem::swap(a, b);
    }

    /// Number of elements: 1 for scalars and strings, the element count for
    /// vectors.
    pub fn item_count(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::VecI8(b) => b.len(),
            Value::VecI16(b) => b.len(),
            Value::VecI32(b) => b.len(),
            Value::VecI64(b) => b.len(),
            Value::VecU8(b) => b.len(),
            Value::VecU16(b) => b.len(),
            Value::VecU32(b) => b.len(),
            Value::VecU64(b) => b.len(),
            Value::VecF32(b) => b.len(),
            Value::VecF64(b) => b.len(),
            _ => 1,
        }
    }

    /// Structural, by-variant equality. `Null` is never equal to `Null`.
    /// Floats compare by bitwise equality of their representation, so
    /// `NaN != NaN` but `-0.0 == 0.0` only if their bit patterns match
    /// (they do not: `-0.0`'s sign bit differs).
    pub fn is_equal(a: &Value, b: &Value) -> bool {
        use Value::*;
        match (a, b) {
            (Null, Null) => false,
            (Bool(x), Bool(y)) => x == y,
            (I8(x), I8(y)) => x == y,
            (I16(x), I16(y)) => x == y,
            (I32(x), I32(y)) => x == y,
            (I64(x), I64(y)) => x == y,
            (U8(x), U8(y)) => x == y,
            (U16(x), U16(y)) => x == y,
            (U32(x), U32(y)) => x == y,
            (U64(x), U64(y)) => x == y,
            (F32(x), F32(y)) => x.to_bits() == y.to_bits(),
            (F64(x), F64(y)) => x.to_bits() == y.to_bits(),
            (String(x), String(y)) => x == y,
            (VecI8(x), VecI8(y)) => x == y,
            (VecI16(x), VecI16(y)) => x == y,
            (VecI32(x), VecI32(y)) => x == y,
            (VecI64(x), VecI64(y)) => x == y,
            (VecU8(x), VecU8(y)) => x == y,
            (VecU16(x), VecU16(y)) => x == y,
            (VecU32(x), VecU32(y)) => x == y,
            (VecU64(x), VecU64(y)) => x == y,
            (VecF32(x), VecF32(y)) => {
                x.as_slice().iter().map(|f| f.to_bits()).eq(y.as_slice().iter().map(|f| f.to_bits()))
            }
            (VecF64(x), VecF64(y)) => {
                x.as_slice().iter().map(|f| f.to_bits()).eq(y.as_slice().iter().map(|f| f.to_bits()))
            }
            _ => false,
        }
    }

    /// Renders the value as text. Numeric scalars use Rust's shortest
    /// round-trip-exact formatting (equivalent in effect to the source's
    /// 17-significant-digit `%.17g` for `f64`: both guarantee
    /// `from_string(to_string(v)) == v` for every finite value). Vectors
    /// render as `[e0, e1, ...]`.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::I8(x) => x.to_string(),
            Value::I16(x) => x.to_string(),
            Value::I32(x) => x.to_string(),
            Value::I64(x) => x.to_string(),
            Value::U8(x) => x.to_string(),
            Value::U16(x) => x.to_string(),
            Value::U32(x) => x.to_string(),
            Value::U64(x) => x.to_string(),
            Value::F32(x) => format_float(*x as f64),
            Value::F64(x) => format_float(*x),
            Value::String(s) => s.as_str().to_string(),
            Value::VecI8(b) => render_vec(b.as_slice()),
            Value::VecI16(b) => render_vec(b.as_slice()),
            Value::VecI32(b) => render_vec(b.as_slice()),
            Value::VecI64(b) => render_vec(b.as_slice()),
            Value::VecU8(b) => render_vec(b.as_slice()),
            Value::VecU16(b) => render_vec(b.as_slice()),
            Value::VecU32(b) => render_vec(b.as_slice()),
            Value::VecU64(b) => render_vec(b.as_slice()),
            Value::VecF32(b) => {
                render_vec_with(b.as_slice(), |f| format_float(*f as f64))
            }
            Value::VecF64(b) => render_vec_with(b.as_slice(), |f| format_float(*f)),
        }
    }

    /// Parses `text` into a value of `target_type`, applying the
    /// coercion rules for that type (saturating clamp for integers,
    /// rounding for float-to-integer, infinity on float overflow).
    pub fn from_string(text: &str, target_type: ValueType) -> (Value, ConvResult) {
        let text = text.trim();
        match target_type {
            ValueType::Null => (Value::Null, ConvResult::Failed),
            ValueType::Bool => match text {
                "true" | "1" => (Value::Bool(true), ConvResult::Success),
                "false" | "0" => (Value::Bool(false), ConvResult::Success),
                _ => (Value::Null, ConvResult::Failed),
            },
            ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64
            | ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64 => {
                let (min, max) = target_type.int_bounds();
                match parse_int(text, min, max) {
                    Some((v, result)) => (int_value_of(target_type, v), result),
                    None => (Value::Null, ConvResult::Failed),
                }
            }
            ValueType::F32 => match text.parse::<f64>() {
                Ok(v) => (Value::F32(v as f32), ConvResult::Success),
                Err(_) => (Value::Null, ConvResult::Failed),
            },
            ValueType::F64 => match text.parse::<f64>() {
                Ok(v) => (Value::F64(v), ConvResult::Success),
                Err(_) => (Value::Null, ConvResult::Failed),
            },
            ValueType::String => (Value::new_string(text), ConvResult::Success),
            vt if vt.is_vector() => from_string_vector(text, vt),
            _ => (Value::Null, ConvResult::Failed),
        }
    }
}

fn format_float(v: f64) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    v.to_string()
}

fn render_vec<T: fmt::Display>(items: &[T]) -> String {
    render_vec_with(items, |x| x.to_string())
}

fn render_vec_with<T>(items: &[T], f: impl Fn(&T) -> String) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&f(item));
    }
    out.push(']');
    out
}

/// Parses `text` as an integer, falling back to float parsing + rounding.
/// Returns `None` only when neither parse succeeds (`Failed`); otherwise
/// the clamped value and whether clamping/rounding occurred.
fn parse_int(text: &str, min: i128, max: i128) -> Option<(i128, ConvResult)> {
    if text.is_empty() {
        return None;
    }
    if let Ok(v) = text.parse::<i128>() {
        return Some(clamp_i128(v, min, max));
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_nan() {
            return None;
        }
        let rounded = f.round();
        let clamped_f = rounded.clamp(min as f64, max as f64);
        return Some((clamped_f as i128, ConvResult::Truncated));
    }
    None
}

fn clamp_i128(v: i128, min: i128, max: i128) -> (i128, ConvResult) {
    if v < min {
        (min, ConvResult::Truncated)
    } else if v > max {
        (max, ConvResult::Truncated)
    } else {
        (v, ConvResult::Success)
    }
}

fn int_value_of(target_type: ValueType, v: i128) -> Value {
    match target_type {
        ValueType::I8 => Value::I8(v as i8),
        ValueType::I16 => Value::I16(v as i16),
        ValueType::I32 => Value::I32(v as i32),
        ValueType::I64 => Value::I64(v as i64),
        ValueType::U8 => Value::U8(v as u8),
        ValueType::U16 => Value::U16(v as u16),
        ValueType::U32 => Value::U32(v as u32),
        ValueType::U64 => Value::U64(v as u64),
        _ => unreachable!(),
    }
}

fn from_string_vector(text: &str, target_type: ValueType) -> (Value, ConvResult) {
    let parsed: Result<Vec<serde_json::Value>, _> = serde_json::from_str(text);
    let Ok(items) = parsed else {
        return (Value::Null, ConvResult::Failed);
    };
    let elem_type = target_type.element_type();
    let mut truncated = false;
    macro_rules! build_int_vec {
        ($ctor:path, $min:expr, $max:expr, $cast:ty) => {{
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let Some(f) = item.as_f64() else {
                    return (Value::Null, ConvResult::Failed);
                };
                let rounded = f.round();
                if rounded != f {
                    truncated = true;
                }
                let clamped = rounded.clamp($min as f64, $max as f64);
                if clamped != rounded {
                    truncated = true;
                }
                out.push(clamped as $cast);
            }
            (
                $ctor(&out),
                if truncated { ConvResult::Truncated } else { ConvResult::Success },
            )
        }};
    }
    match elem_type {
        ValueType::I8 => build_int_vec!(Value::new_vec_i8, i8::MIN, i8::MAX, i8),
        ValueType::I16 => build_int_vec!(Value::new_vec_i16, i16::MIN, i16::MAX, i16),
        ValueType::I32 => build_int_vec!(Value::new_vec_i32, i32::MIN, i32::MAX, i32),
        ValueType::I64 => build_int_vec!(Value::new_vec_i64, i64::MIN, i64::MAX, i64),
        ValueType::U8 => build_int_vec!(Value::new_vec_u8, u8::MIN, u8::MAX, u8),
        ValueType::U16 => build_int_vec!(Value::new_vec_u16, u16::MIN, u16::MAX, u16),
        ValueType::U32 => build_int_vec!(Value::new_vec_u32, u32::MIN, u32::MAX, u32),
        ValueType::U64 => build_int_vec!(Value::new_vec_u64, u64::MIN, u64::MAX, u64),
        ValueType::F32 => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let Some(f) = item.as_f64() else {
                    return (Value::Null, ConvResult::Failed);
                };
                out.push(f as f32);
            }
            (Value::new_vec_f32(&out), ConvResult::Success)
        }
        ValueType::F64 => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let Some(f) = item.as_f64() else {
                    return (Value::Null, ConvResult::Failed);
                };
                out.push(f);
            }
            (Value::new_vec_f64(&out), ConvResult::Success)
        }
        _ => (Value::Null, ConvResult::Failed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_copy_has_no_net_effect() {
        let v = Value::new_string(&"x".repeat(300));
        let mut copied = v.copy();
        assert!(Value::is_equal(&v, &copied));
        copied.destroy();
        assert!(matches!(copied, Value::Null));
    }

    #[test]
    fn copy_is_equal_for_every_non_null_type() {
        let values = vec![
            Value::new_bool(true),
            Value::new_i32(-7),
            Value::new_u64(42),
            Value::new_f64(1.5),
            Value::new_string("hello"),
            Value::new_vec_i32(&[1, 2, 3]),
        ];
        for v in values {
            assert!(Value::is_equal(&v, &v.copy()));
        }
    }

    #[test]
    fn null_is_never_equal_to_null() {
        assert!(!Value::is_equal(&Value::Null, &Value::Null));
    }

    #[test]
    fn swap_exchanges_without_allocating() {
        let mut a = Value::new_i32(1);
        let mut b = Value::new_i32(2);
        Value::swap(&mut a, &mut b);
        assert!(matches!(a, Value::I32(2)));
        assert!(matches!(b, Value::I32(1)));
    }

    #[test]
    fn nan_is_not_equal_to_nan() {
        let a = Value::new_f64(f64::NAN);
        let b = Value::new_f64(f64::NAN);
        assert!(!Value::is_equal(&a, &b));
    }

    #[test]
    fn item_count_scalar_vs_vector() {
        assert_eq!(Value::new_i32(5).item_count(), 1);
        assert_eq!(Value::new_string("hi").item_count(), 1);
        assert_eq!(Value::new_vec_f32(&[1.0, 2.0, 3.0]).item_count(), 3);
    }

    #[test]
    fn round_trip_every_integer_type() {
        let (v, r) = Value::from_string(&Value::new_i32(12345).to_string_value(), ValueType::I32);
        assert!(Value::is_equal(&v, &Value::new_i32(12345)));
        assert_eq!(r, ConvResult::Success);
    }

    #[test]
    fn round_trip_vector_via_json_array() {
        let (v, r) = Value::from_string("[1, -2, 3]", ValueType::VecI32);
        assert!(Value::is_equal(&v, &Value::new_vec_i32(&[1, -2, 3])));
        assert_eq!(r, ConvResult::Success);
    }

    #[test]
    fn truncating_conversions_match_examples() {
        let (v, r) = Value::from_string("256", ValueType::U8);
        assert!(matches!(v, Value::U8(255)));
        assert_eq!(r, ConvResult::Truncated);

        let (v, r) = Value::from_string("-1", ValueType::U8);
        assert!(matches!(v, Value::U8(0)));
        assert_eq!(r, ConvResult::Truncated);

        let (v, r) = Value::from_string("3.7", ValueType::I32);
        assert!(matches!(v, Value::I32(4)));
        assert_eq!(r, ConvResult::Truncated);

        let (v, r) = Value::from_string("2.7", ValueType::I32);
        assert!(matches!(v, Value::I32(3)));
        assert_eq!(r, ConvResult::Truncated);
    }

    #[test]
    fn infinite_float_is_success_not_truncated() {
        let (v, r) = Value::from_string("1.5e309", ValueType::F64);
        assert!(matches!(v, Value::F64(f) if f.is_infinite() && f.is_sign_positive()));
        assert_eq!(r, ConvResult::Success);
    }

    #[test]
    fn empty_or_non_numeric_text_fails() {
        let (_, r) = Value::from_string("", ValueType::I32);
        assert_eq!(r, ConvResult::Failed);
        let (_, r) = Value::from_string("not-a-number", ValueType::I32);
        assert_eq!(r, ConvResult::Failed);
    }

    #[test]
    fn bool_accepts_only_exact_tokens() {
        assert_eq!(Value::from_string("true", ValueType::Bool).1, ConvResult::Success);
        assert_eq!(Value::from_string("1", ValueType::Bool).1, ConvResult::Success);
        assert_eq!(Value::from_string("yes", ValueType::Bool).1, ConvResult::Failed);
    }
}
