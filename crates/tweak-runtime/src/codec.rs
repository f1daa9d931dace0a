//! Wire codec: encodes and decodes the five protocol messages to/from
//! self-delimiting byte buffers with a deterministic layout.
//!
//! Frame layout: `[kind: u8][body...]`. Lengths are `u32` big-endian.
//! Strings are a `u32` length prefix plus UTF-8 bytes. Values are a 1-byte
//! type tag followed by a type-specific payload; string/vector payloads
//! carry their own length prefix. No checksum trailer: decoding only needs
//! to reject malformed input, not detect bit flips, and the transport below
//! is assumed ordered and length-preserving.

use crate::error::Error;
use tweak_core::{Value, ValueType};

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Features { features: String },
    AddItem {
        id: u64,
        uri: String,
        description: String,
        meta: String,
        default: Value,
        current: Value,
    },
    ChangeItem { id: u64, value: Value },
    RemoveItem { id: u64 },
    Subscribe { uri_patterns: String },
}

const KIND_FEATURES: u8 = 0;
const KIND_ADD_ITEM: u8 = 1;
const KIND_CHANGE_ITEM: u8 = 2;
const KIND_REMOVE_ITEM: u8 = 3;
const KIND_SUBSCRIBE: u8 = 4;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_I8: u8 = 2;
const TAG_I16: u8 = 3;
const TAG_I32: u8 = 4;
const TAG_I64: u8 = 5;
const TAG_U8: u8 = 6;
const TAG_U16: u8 = 7;
const TAG_U32: u8 = 8;
const TAG_U64: u8 = 9;
const TAG_F32: u8 = 10;
const TAG_F64: u8 = 11;
const TAG_STRING: u8 = 12;
const TAG_VEC_I8: u8 = 13;
const TAG_VEC_I16: u8 = 14;
const TAG_VEC_I32: u8 = 15;
const TAG_VEC_I64: u8 = 16;
const TAG_VEC_U8: u8 = 17;
const TAG_VEC_U16: u8 = 18;
const TAG_VEC_U32: u8 = 19;
const TAG_VEC_U64: u8 = 20;
const TAG_VEC_F32: u8 = 21;
const TAG_VEC_F64: u8 = 22;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer { buf: Vec::new() }
    }
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }
    fn string(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }
    fn value(&mut self, v: &Value) {
        match v {
            Value::Null => self.u8(TAG_NULL),
            Value::Bool(b) => {
                self.u8(TAG_BOOL);
                self.u8(*b as u8);
            }
            Value::I8(x) => {
                self.u8(TAG_I8);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::I16(x) => {
                self.u8(TAG_I16);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::I32(x) => {
                self.u8(TAG_I32);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::I64(x) => {
                self.u8(TAG_I64);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::U8(x) => {
                self.u8(TAG_U8);
                self.buf.push(*x);
            }
            Value::U16(x) => {
                self.u8(TAG_U16);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::U32(x) => {
                self.u8(TAG_U32);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::U64(x) => {
                self.u8(TAG_U64);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::F32(x) => {
                self.u8(TAG_F32);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::F64(x) => {
                self.u8(TAG_F64);
                self.buf.extend_from_slice(&x.to_be_bytes());
            }
            Value::String(s) => {
                self.u8(TAG_STRING);
                self.string(s.as_str());
            }
            Value::VecI8(b) => {
                self.u8(TAG_VEC_I8);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecI16(b) => {
                self.u8(TAG_VEC_I16);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecI32(b) => {
                self.u8(TAG_VEC_I32);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecI64(b) => {
                self.u8(TAG_VEC_I64);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecU8(b) => {
                self.u8(TAG_VEC_U8);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                self.buf.extend_from_slice(s);
            }
            Value::VecU16(b) => {
                self.u8(TAG_VEC_U16);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecU32(b) => {
                self.u8(TAG_VEC_U32);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecU64(b) => {
                self.u8(TAG_VEC_U64);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecF32(b) => {
                self.u8(TAG_VEC_F32);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
            Value::VecF64(b) => {
                self.u8(TAG_VEC_F64);
                let s = b.as_slice();
                self.u32(s.len() as u32);
                for x in s {
                    self.buf.extend_from_slice(&x.to_be_bytes());
                }
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.pos + n > self.buf.len() {
            return Err(Error::DecodeError("unexpected end of message".to_string()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }
    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }
    fn u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }
    fn i8(&mut self) -> Result<i8, Error> {
        Ok(self.take(1)?[0] as i8)
    }
    fn i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }
    fn i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }
    fn i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }
    fn f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }
    fn f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String, Error> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::DecodeError("invalid UTF-8 in string field".to_string()))
    }

    fn value(&mut self) -> Result<Value, Error> {
        let tag = self.u8()?;
        Ok(match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => Value::Bool(self.u8()? != 0),
            TAG_I8 => Value::I8(self.i8()?),
            TAG_I16 => Value::I16(self.i16()?),
            TAG_I32 => Value::I32(self.i32()?),
            TAG_I64 => Value::I64(self.i64()?),
            TAG_U8 => Value::U8(self.u8()?),
            TAG_U16 => Value::U16(self.u16()?),
            TAG_U32 => Value::U32(self.u32()?),
            TAG_U64 => Value::U64(self.u64()?),
            TAG_F32 => Value::F32(self.f32()?),
            TAG_F64 => Value::F64(self.f64()?),
            TAG_STRING => Value::new_string(&self.string()?),
            TAG_VEC_I8 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.i8()?);
                }
                Value::new_vec_i8(&v)
            }
            TAG_VEC_I16 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.i16()?);
                }
                Value::new_vec_i16(&v)
            }
            TAG_VEC_I32 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.i32()?);
                }
                Value::new_vec_i32(&v)
            }
            TAG_VEC_I64 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.i64()?);
                }
                Value::new_vec_i64(&v)
            }
            TAG_VEC_U8 => {
                let n = self.u32()? as usize;
                Value::new_vec_u8(self.take(n)?)
            }
            TAG_VEC_U16 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.u16()?);
                }
                Value::new_vec_u16(&v)
            }
            TAG_VEC_U32 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.u32()?);
                }
                Value::new_vec_u32(&v)
            }
            TAG_VEC_U64 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.u64()?);
                }
                Value::new_vec_u64(&v)
            }
            TAG_VEC_F32 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.f32()?);
                }
                Value::new_vec_f32(&v)
            }
            TAG_VEC_F64 => {
                let n = self.u32()? as usize;
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.f64()?);
                }
                Value::new_vec_f64(&v)
            }
            other => return Err(Error::DecodeError(format!("unknown value tag {}", other))),
        })
    }

    fn finish(self) -> Result<(), Error> {
        if self.pos != self.buf.len() {
            return Err(Error::DecodeError("trailing bytes after message".to_string()));
        }
        Ok(())
    }
}

/// Encodes `msg` to a self-delimiting byte buffer. The same logical
/// message always produces the same bytes.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut w = Writer::new();
    match msg {
        Message::Features { features } => {
            w.u8(KIND_FEATURES);
            w.string(features);
        }
        Message::AddItem { id, uri, description, meta, default, current } => {
            w.u8(KIND_ADD_ITEM);
            w.u64(*id);
            w.string(uri);
            w.string(description);
            w.string(meta);
            w.value(default);
            w.value(current);
        }
        Message::ChangeItem { id, value } => {
            w.u8(KIND_CHANGE_ITEM);
            w.u64(*id);
            w.value(value);
        }
        Message::RemoveItem { id } => {
            w.u8(KIND_REMOVE_ITEM);
            w.u64(*id);
        }
        Message::Subscribe { uri_patterns } => {
            w.u8(KIND_SUBSCRIBE);
            w.string(uri_patterns);
        }
    }
    w.buf
}

/// Decodes one message from `bytes`. Rejects malformed input without
/// panicking: any short read, invalid tag, or invalid UTF-8 produces
/// `Error::DecodeError`, leaving no partial state behind (the `Message` is
/// only constructed once decoding fully succeeds).
pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
    let mut r = Reader::new(bytes);
    let kind = r.u8()?;
    let msg = match kind {
        KIND_FEATURES => Message::Features { features: r.string()? },
        KIND_ADD_ITEM => {
            let id = r.u64()?;
            let uri = r.string()?;
            let description = r.string()?;
            let meta = r.string()?;
            let default = r.value()?;
            let current = r.value()?;
            Message::AddItem { id, uri, description, meta, default, current }
        }
        KIND_CHANGE_ITEM => Message::ChangeItem { id: r.u64()?, value: r.value()? },
        KIND_REMOVE_ITEM => Message::RemoveItem { id: r.u64()? },
        KIND_SUBSCRIBE => Message::Subscribe { uri_patterns: r.string()? },
        other => return Err(Error::DecodeError(format!("unknown message kind {}", other))),
    };
    r.finish()?;
    Ok(msg)
}

/// Names the feature flag `value_type` requires, if any. Numeric and
/// boolean scalars are baseline and always permitted; vectors and strings
/// are opt-in and require the peer to have negotiated the matching flag.
pub fn type_requires_feature(value_type: ValueType) -> Option<&'static str> {
    if value_type.is_vector() {
        Some("vector")
    } else if value_type == ValueType::String {
        Some("string")
    } else {
        None
    }
}
