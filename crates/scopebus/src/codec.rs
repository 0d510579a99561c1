// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type codecs.
//!
//! A type name is either one of the primitive names (`string`, `float`,
//! `double`, `integer`, `bool`) or the dotted name of a structured type
//! whose schema is found through [`SchemaResolver`].
//!
//! Primitive payloads travel on the bus as plain JSON values. Structured
//! payloads travel as a JSON string: a NUL sentinel followed by the base64
//! text of the binary encoding.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{wire, DynamicData, SchemaLoader, SchemaResolver, TypeDescriptor};
use base64::Engine;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Leading marker of a structured payload string.
pub const STRUCTURED_SENTINEL: char = '\0';

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    /// `float` and `double`
    Float,
    Integer,
    Bool,
}

impl PrimitiveType {
    /// Look up a primitive type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "float" | "double" => Some(Self::Float),
            "integer" => Some(Self::Integer),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Bool => "bool",
        }
    }

    /// Zero value for the type.
    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Float => serde_json::json!(0.0),
            Self::Integer => serde_json::json!(0),
            Self::Bool => Value::Bool(false),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of classifying a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Primitive(PrimitiveType),
    Structured,
}

/// Classify a type name. Anything outside the primitive vocabulary is
/// structured.
pub fn classify(type_name: &str) -> TypeClass {
    match PrimitiveType::from_name(type_name) {
        Some(p) => TypeClass::Primitive(p),
        None => TypeClass::Structured,
    }
}

/// Resolved type behind a codec.
#[derive(Debug, Clone)]
pub enum BusType {
    Primitive(PrimitiveType),
    Structured(Arc<TypeDescriptor>),
}

/// A payload at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Plain JSON; primitives, or structured values not yet typed.
    Raw(Value),
    /// Instance of a structured type.
    Typed(DynamicData),
}

impl Sample {
    /// Plain JSON view, for either variant.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Raw(v) => v.clone(),
            Self::Typed(data) => data.to_json(),
        }
    }

    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Self::Raw(v) => Some(v),
            Self::Typed(_) => None,
        }
    }

    pub fn as_typed(&self) -> Option<&DynamicData> {
        match self {
            Self::Typed(data) => Some(data),
            Self::Raw(_) => None,
        }
    }

    pub fn into_typed(self) -> Option<DynamicData> {
        match self {
            Self::Typed(data) => Some(data),
            Self::Raw(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_raw().and_then(Value::as_str)
    }

    fn kind(&self) -> String {
        match self {
            Self::Raw(v) => format!("raw {}", json_kind(v)),
            Self::Typed(data) => data.type_name().to_string(),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Value> for Sample {
    fn from(v: Value) -> Self {
        Self::Raw(v)
    }
}

impl From<DynamicData> for Sample {
    fn from(data: DynamicData) -> Self {
        Self::Typed(data)
    }
}

impl From<&str> for Sample {
    fn from(s: &str) -> Self {
        Self::Raw(Value::String(s.to_string()))
    }
}

impl From<String> for Sample {
    fn from(s: String) -> Self {
        Self::Raw(Value::String(s))
    }
}

impl From<f64> for Sample {
    fn from(n: f64) -> Self {
        Self::Raw(serde_json::json!(n))
    }
}

impl From<i64> for Sample {
    fn from(n: i64) -> Self {
        Self::Raw(serde_json::json!(n))
    }
}

impl From<bool> for Sample {
    fn from(b: bool) -> Self {
        Self::Raw(Value::Bool(b))
    }
}

/// Encoder/decoder for one type name.
#[derive(Debug, Clone)]
pub struct TypeCodec {
    type_name: String,
    bus_type: BusType,
}

impl TypeCodec {
    /// Codec for a primitive type.
    pub fn primitive(primitive: PrimitiveType) -> Self {
        Self {
            type_name: primitive.name().to_string(),
            bus_type: BusType::Primitive(primitive),
        }
    }

    /// Codec for a structured type.
    pub fn structured(descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            type_name: descriptor.name.clone(),
            bus_type: BusType::Structured(descriptor),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn bus_type(&self) -> &BusType {
        &self.bus_type
    }

    pub fn is_structured(&self) -> bool {
        matches!(self.bus_type, BusType::Structured(_))
    }

    /// Fresh value: primitive zero, or a structured instance with null
    /// optional fields.
    pub fn default_value(&self) -> Sample {
        match &self.bus_type {
            BusType::Primitive(p) => Sample::Raw(p.default_value()),
            BusType::Structured(desc) => Sample::Typed(DynamicData::new(desc)),
        }
    }

    /// Convert a sample to its bus form.
    pub fn encode(&self, sample: Sample) -> BridgeResult<Value> {
        match &self.bus_type {
            BusType::Primitive(p) => match sample {
                Sample::Raw(v) => Ok(v),
                Sample::Typed(data) => Err(BridgeError::TypeMismatch {
                    expected: p.name().to_string(),
                    got: data.type_name().to_string(),
                }),
            },
            BusType::Structured(desc) => {
                let data = match sample {
                    Sample::Typed(data) if data.type_name() == desc.name => data,
                    Sample::Typed(data) => {
                        return Err(BridgeError::TypeMismatch {
                            expected: desc.name.clone(),
                            got: data.type_name().to_string(),
                        })
                    }
                    Sample::Raw(json @ Value::Object(_)) => DynamicData::from_json(desc, &json)
                        .map_err(|e| BridgeError::encode(&self.type_name, e))?,
                    other => {
                        return Err(BridgeError::TypeMismatch {
                            expected: desc.name.clone(),
                            got: other.kind(),
                        })
                    }
                };
                let bytes =
                    wire::encode(&data).map_err(|e| BridgeError::encode(&self.type_name, e))?;
                let mut text = String::with_capacity(1 + bytes.len().div_ceil(3) * 4);
                text.push(STRUCTURED_SENTINEL);
                base64::engine::general_purpose::STANDARD.encode_string(&bytes, &mut text);
                Ok(Value::String(text))
            }
        }
    }

    /// Convert a bus payload back to a sample.
    pub fn decode(&self, raw: &Value) -> BridgeResult<Sample> {
        match &self.bus_type {
            BusType::Primitive(_) => Ok(Sample::Raw(raw.clone())),
            BusType::Structured(desc) => {
                let text = raw.as_str().ok_or_else(|| {
                    BridgeError::decode(
                        &self.type_name,
                        format!("expected encoded string, got {}", json_kind(raw)),
                    )
                })?;
                let body = text.strip_prefix(STRUCTURED_SENTINEL).ok_or_else(|| {
                    BridgeError::decode(&self.type_name, "missing structured payload marker")
                })?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(body)
                    .map_err(|e| BridgeError::decode(&self.type_name, e))?;
                let data =
                    wire::decode(&bytes, desc).map_err(|e| BridgeError::decode(&self.type_name, e))?;
                Ok(Sample::Typed(data))
            }
        }
    }
}

/// Resolves type names to codecs, caching structured descriptors.
#[derive(Debug)]
pub struct CodecRegistry {
    resolver: SchemaResolver,
    cache: DashMap<String, Arc<TypeDescriptor>>,
}

impl CodecRegistry {
    pub fn new(resolver: SchemaResolver) -> Self {
        Self {
            resolver,
            cache: DashMap::new(),
        }
    }

    /// Registry reading schemas from the configured root on disk.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(SchemaResolver::filesystem(config.schema_root.clone()))
    }

    /// Registry reading schemas through `loader` under `root`.
    pub fn with_loader(root: impl Into<std::path::PathBuf>, loader: Arc<dyn SchemaLoader>) -> Self {
        Self::new(SchemaResolver::new(root, loader))
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Register a descriptor directly, bypassing the schema lookup.
    pub fn insert(&self, descriptor: Arc<TypeDescriptor>) {
        self.cache.insert(descriptor.name.clone(), descriptor);
    }

    /// Codec for a type name.
    pub fn resolve(&self, type_name: &str) -> BridgeResult<TypeCodec> {
        match classify(type_name) {
            TypeClass::Primitive(p) => Ok(TypeCodec::primitive(p)),
            TypeClass::Structured => {
                if let Some(desc) = self.cache.get(type_name) {
                    return Ok(TypeCodec::structured(desc.clone()));
                }
                let desc = self.resolver.resolve(type_name)?;
                debug!("Resolved structured type '{}'", type_name);
                self.cache.insert(type_name.to_string(), desc.clone());
                Ok(TypeCodec::structured(desc))
            }
        }
    }

    /// Whether a structured type is already cached.
    pub fn is_cached(&self, type_name: &str) -> bool {
        self.cache.contains_key(type_name)
    }

    pub fn default_value(&self, type_name: &str) -> BridgeResult<Sample> {
        Ok(self.resolve(type_name)?.default_value())
    }

    pub fn encode(&self, type_name: &str, sample: Sample) -> BridgeResult<Value> {
        self.resolve(type_name)?.encode(sample)
    }

    pub fn decode(&self, type_name: &str, raw: &Value) -> BridgeResult<Sample> {
        self.resolve(type_name)?.decode(raw)
    }
}
