// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary encoding for DynamicData.
//!
//! Little-endian and unaligned. Optional fields are prefixed with a presence
//! byte (0 = null, 1 = value follows). Strings, bytes and repeated fields
//! carry a u32 length prefix; nested structs are written inline.

use crate::types::{DynamicData, DynamicValue, PrimitiveKind, TypeDescriptor, TypeKind};
use std::fmt;
use std::sync::Arc;

/// Errors for binary encode/decode.
#[derive(Debug)]
pub enum WireError {
    BufferTooSmall { need: usize, have: usize },
    InvalidData(String),
    Utf8Error(std::string::FromUtf8Error),
    TypeMismatch { expected: String, found: String },
    TrailingBytes(usize),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { need, have } => {
                write!(f, "Buffer too small: need {} bytes, have {}", need, have)
            }
            Self::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Self::Utf8Error(e) => write!(f, "UTF-8 error: {}", e),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            Self::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
        }
    }
}

impl std::error::Error for WireError {}

impl From<std::string::FromUtf8Error> for WireError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::Utf8Error(e)
    }
}

/// Encode DynamicData to bytes.
pub fn encode(data: &DynamicData) -> Result<Vec<u8>, WireError> {
    let mut encoder = Encoder::default();
    encoder.encode_value(data.value(), &data.descriptor().kind)?;
    Ok(encoder.buffer)
}

/// Decode bytes to DynamicData. The whole buffer must be consumed.
pub fn decode(bytes: &[u8], descriptor: &Arc<TypeDescriptor>) -> Result<DynamicData, WireError> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode_value(&descriptor.kind)?;
    if decoder.remaining() > 0 {
        return Err(WireError::TrailingBytes(decoder.remaining()));
    }
    DynamicData::from_value(descriptor, value).map_err(|e| WireError::InvalidData(e.to_string()))
}

#[derive(Default)]
struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn write_len(&mut self, len: usize) -> Result<(), WireError> {
        let len = u32::try_from(len)
            .map_err(|_| WireError::InvalidData(format!("length {} exceeds u32", len)))?;
        self.buffer.extend(&len.to_le_bytes());
        Ok(())
    }

    fn encode_value(&mut self, value: &DynamicValue, kind: &TypeKind) -> Result<(), WireError> {
        match kind {
            TypeKind::Primitive(p) => self.encode_primitive(value, *p),
            TypeKind::Struct(fields) => {
                let DynamicValue::Struct(map) = value else {
                    return Err(mismatch("struct", value));
                };
                for field in fields {
                    let field_value = map.get(&field.name).unwrap_or(&DynamicValue::Null);
                    if field.optional {
                        if field_value.is_null() {
                            self.buffer.push(0);
                            continue;
                        }
                        self.buffer.push(1);
                    } else if field_value.is_null() {
                        return Err(WireError::InvalidData(format!(
                            "Missing required field: {}",
                            field.name
                        )));
                    }
                    self.encode_value(field_value, &field.type_desc.kind)?;
                }
                Ok(())
            }
            TypeKind::Sequence(elem) => {
                let DynamicValue::Sequence(items) = value else {
                    return Err(mismatch("sequence", value));
                };
                self.write_len(items.len())?;
                for item in items {
                    self.encode_value(item, &elem.kind)?;
                }
                Ok(())
            }
            TypeKind::Enum(_) => {
                let DynamicValue::Enum(val, _) = value else {
                    return Err(mismatch("enum", value));
                };
                let val = i32::try_from(*val)
                    .map_err(|_| WireError::InvalidData(format!("enum value {} out of range", val)))?;
                self.buffer.extend(&val.to_le_bytes());
                Ok(())
            }
            TypeKind::Nested(inner) => self.encode_value(value, &inner.kind),
        }
    }

    fn encode_primitive(&mut self, value: &DynamicValue, kind: PrimitiveKind) -> Result<(), WireError> {
        match (value, kind) {
            (DynamicValue::Bool(v), PrimitiveKind::Bool) => self.buffer.push(u8::from(*v)),
            (DynamicValue::I32(v), PrimitiveKind::I32) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::I64(v), PrimitiveKind::I64) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::U32(v), PrimitiveKind::U32) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::U64(v), PrimitiveKind::U64) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::F32(v), PrimitiveKind::F32) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::F64(v), PrimitiveKind::F64) => self.buffer.extend(&v.to_le_bytes()),
            (DynamicValue::String(s), PrimitiveKind::String) => {
                self.write_len(s.len())?;
                self.buffer.extend(s.as_bytes());
            }
            (DynamicValue::Bytes(b), PrimitiveKind::Bytes) => {
                self.write_len(b.len())?;
                self.buffer.extend(b);
            }
            _ => return Err(mismatch(kind.keyword(), value)),
        }
        Ok(())
    }
}

fn mismatch(expected: &str, found: &DynamicValue) -> WireError {
    WireError::TypeMismatch {
        expected: expected.into(),
        found: format!("{:?}", found),
    }
}

struct Decoder<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        if count > self.remaining() {
            return Err(WireError::BufferTooSmall {
                need: count,
                have: self.remaining(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize, WireError> {
        let len = u32::from_le_bytes(self.read_array()?) as usize;
        // Every element takes at least one byte; rejects absurd prefixes early.
        if len > self.remaining() {
            return Err(WireError::BufferTooSmall {
                need: len,
                have: self.remaining(),
            });
        }
        Ok(len)
    }

    fn decode_value(&mut self, kind: &TypeKind) -> Result<DynamicValue, WireError> {
        match kind {
            TypeKind::Primitive(p) => self.decode_primitive(*p),
            TypeKind::Struct(fields) => {
                let mut map = std::collections::HashMap::with_capacity(fields.len());
                for field in fields {
                    let value = if field.optional {
                        match self.read_array::<1>()?[0] {
                            0 => DynamicValue::Null,
                            1 => self.decode_value(&field.type_desc.kind)?,
                            other => {
                                return Err(WireError::InvalidData(format!(
                                    "bad presence byte {} for field {}",
                                    other, field.name
                                )))
                            }
                        }
                    } else {
                        self.decode_value(&field.type_desc.kind)?
                    };
                    map.insert(field.name.clone(), value);
                }
                Ok(DynamicValue::Struct(map))
            }
            TypeKind::Sequence(elem) => {
                let len = self.read_len()?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.decode_value(&elem.kind)?);
                }
                Ok(DynamicValue::Sequence(items))
            }
            TypeKind::Enum(e) => {
                let val = i64::from(i32::from_le_bytes(self.read_array()?));
                let variant = e
                    .variant_by_value(val)
                    .ok_or_else(|| WireError::InvalidData(format!("unknown enum value {}", val)))?;
                Ok(DynamicValue::Enum(val, variant.name.clone()))
            }
            TypeKind::Nested(inner) => self.decode_value(&inner.kind),
        }
    }

    fn decode_primitive(&mut self, kind: PrimitiveKind) -> Result<DynamicValue, WireError> {
        Ok(match kind {
            PrimitiveKind::Bool => match self.read_array::<1>()?[0] {
                0 => DynamicValue::Bool(false),
                1 => DynamicValue::Bool(true),
                other => return Err(WireError::InvalidData(format!("bad bool byte {}", other))),
            },
            PrimitiveKind::I32 => DynamicValue::I32(i32::from_le_bytes(self.read_array()?)),
            PrimitiveKind::I64 => DynamicValue::I64(i64::from_le_bytes(self.read_array()?)),
            PrimitiveKind::U32 => DynamicValue::U32(u32::from_le_bytes(self.read_array()?)),
            PrimitiveKind::U64 => DynamicValue::U64(u64::from_le_bytes(self.read_array()?)),
            PrimitiveKind::F32 => DynamicValue::F32(f32::from_le_bytes(self.read_array()?)),
            PrimitiveKind::F64 => DynamicValue::F64(f64::from_le_bytes(self.read_array()?)),
            PrimitiveKind::String => {
                let len = self.read_len()?;
                let bytes = self.read_bytes(len)?;
                DynamicValue::String(String::from_utf8(bytes.to_vec())?)
            }
            PrimitiveKind::Bytes => {
                let len = self.read_len()?;
                DynamicValue::Bytes(self.read_bytes(len)?.to_vec())
            }
        })
    }
}
