// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic value types.

use crate::types::{PrimitiveKind, TypeDescriptor, TypeKind};
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// A dynamic value that can hold any structured field.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),

    Struct(HashMap<String, DynamicValue>),
    Sequence(Vec<DynamicValue>),
    Enum(i64, String), // (value, variant_name)

    /// Unset optional field.
    Null,
}

/// A JSON value that does not fit the descriptor it was converted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    /// Dotted path of the offending field (empty for the root).
    pub path: String,
    /// What went wrong.
    pub message: String,
}

impl ConversionError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ConversionError {}

impl DynamicValue {
    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i64 (any integer kind that fits).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            Self::U32(v) => Some(i64::from(*v)),
            Self::U64(v) => i64::try_from(*v).ok(),
            Self::Enum(v, _) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as sequence.
    pub fn as_sequence(&self) -> Option<&[DynamicValue]> {
        match self {
            Self::Sequence(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get struct field.
    pub fn get_field(&self, name: &str) -> Option<&DynamicValue> {
        match self {
            Self::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Zero value for a type kind. Optional struct fields start out null.
    pub fn default_for(kind: &TypeKind) -> Self {
        match kind {
            TypeKind::Primitive(p) => Self::default_primitive(*p),
            TypeKind::Struct(fields) => {
                let map = fields
                    .iter()
                    .map(|field| {
                        let value = if field.optional {
                            Self::Null
                        } else {
                            Self::default_for(&field.type_desc.kind)
                        };
                        (field.name.clone(), value)
                    })
                    .collect();
                Self::Struct(map)
            }
            TypeKind::Sequence(_) => Self::Sequence(Vec::new()),
            TypeKind::Enum(e) => match e.variants.first() {
                Some(v) => Self::Enum(v.value, v.name.clone()),
                None => Self::Enum(0, String::new()),
            },
            TypeKind::Nested(inner) => Self::default_for(&inner.kind),
        }
    }

    fn default_primitive(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Bool => Self::Bool(false),
            PrimitiveKind::I32 => Self::I32(0),
            PrimitiveKind::I64 => Self::I64(0),
            PrimitiveKind::U32 => Self::U32(0),
            PrimitiveKind::U64 => Self::U64(0),
            PrimitiveKind::F32 => Self::F32(0.0),
            PrimitiveKind::F64 => Self::F64(0.0),
            PrimitiveKind::String => Self::String(String::new()),
            PrimitiveKind::Bytes => Self::Bytes(Vec::new()),
        }
    }

    /// Convert a plain JSON value into a value shaped by `desc`.
    ///
    /// Missing or null optional fields become [`DynamicValue::Null`]; missing
    /// required fields take their zero value. Unknown object keys are rejected.
    pub fn from_json(value: &Value, desc: &TypeDescriptor) -> Result<Self, ConversionError> {
        Self::from_json_at(value, &desc.kind, "")
    }

    fn from_json_at(value: &Value, kind: &TypeKind, path: &str) -> Result<Self, ConversionError> {
        match kind {
            TypeKind::Primitive(p) => Self::primitive_from_json(value, *p, path),
            TypeKind::Struct(fields) => {
                let Value::Object(obj) = value else {
                    return Err(ConversionError::new(path, format!("expected object, got {}", value)));
                };
                if let Some(unknown) = obj.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                    return Err(ConversionError::new(path, format!("unknown field '{}'", unknown)));
                }
                let mut map = HashMap::with_capacity(fields.len());
                for field in fields {
                    let field_path = join_path(path, &field.name);
                    let converted = match obj.get(&field.name) {
                        Some(v) if !v.is_null() => {
                            Self::from_json_at(v, &field.type_desc.kind, &field_path)?
                        }
                        _ if field.optional => Self::Null,
                        _ => Self::default_for(&field.type_desc.kind),
                    };
                    map.insert(field.name.clone(), converted);
                }
                Ok(Self::Struct(map))
            }
            TypeKind::Sequence(elem) => {
                let Value::Array(items) = value else {
                    return Err(ConversionError::new(path, format!("expected array, got {}", value)));
                };
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_json_at(item, &elem.kind, &format!("{}[{}]", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Sequence)
            }
            TypeKind::Enum(e) => {
                let variant = match value {
                    Value::String(name) => e.variant(name),
                    Value::Number(n) => n.as_i64().and_then(|v| e.variant_by_value(v)),
                    _ => None,
                };
                variant
                    .map(|v| Self::Enum(v.value, v.name.clone()))
                    .ok_or_else(|| ConversionError::new(path, format!("no enum variant {}", value)))
            }
            TypeKind::Nested(inner) => Self::from_json_at(value, &inner.kind, path),
        }
    }

    fn primitive_from_json(
        value: &Value,
        kind: PrimitiveKind,
        path: &str,
    ) -> Result<Self, ConversionError> {
        let mismatch = || {
            ConversionError::new(path, format!("expected {}, got {}", kind.keyword(), value))
        };
        let converted = match kind {
            PrimitiveKind::Bool => value.as_bool().map(Self::Bool),
            PrimitiveKind::I32 => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::I32),
            PrimitiveKind::I64 => value.as_i64().map(Self::I64),
            PrimitiveKind::U32 => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Self::U32),
            PrimitiveKind::U64 => value.as_u64().map(Self::U64),
            #[allow(clippy::cast_possible_truncation)]
            PrimitiveKind::F32 => value.as_f64().map(|v| Self::F32(v as f32)),
            PrimitiveKind::F64 => value.as_f64().map(Self::F64),
            PrimitiveKind::String => value.as_str().map(|s| Self::String(s.to_string())),
            PrimitiveKind::Bytes => match value {
                Value::String(s) => base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .ok()
                    .map(Self::Bytes),
                Value::Array(items) => items
                    .iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(Self::Bytes),
                _ => None,
            },
        };
        converted.ok_or_else(mismatch)
    }

    /// Convert to plain JSON. Bytes become base64 strings, enums their
    /// variant name.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::I32(n) => serde_json::json!(*n),
            Self::I64(n) => serde_json::json!(*n),
            Self::U32(n) => serde_json::json!(*n),
            Self::U64(n) => serde_json::json!(*n),
            Self::F32(n) => serde_json::json!(*n),
            Self::F64(n) => serde_json::json!(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Self::Struct(fields) => {
                let obj: Map<String, Value> = fields
                    .iter()
                    .map(|(name, val)| (name.clone(), val.to_json()))
                    .collect();
                Value::Object(obj)
            }
            Self::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Enum(_, name) => Value::String(name.clone()),
            Self::Null => Value::Null,
        }
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}
