// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DynamicData container for structured payloads.

use crate::types::{DynamicValue, PrimitiveKind, TypeDescriptor, TypeKind};
use std::fmt;
use std::sync::Arc;

/// Field access and conversion failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicDataError {
    FieldNotFound(String),
    TypeMismatch { expected: String, got: String },
    InvalidOperation(String),
    Conversion(String),
}

impl fmt::Display for DynamicDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldNotFound(name) => write!(f, "no field '{}'", name),
            Self::TypeMismatch { expected, got } => {
                write!(f, "field expects {}, got {}", expected, got)
            }
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            Self::Conversion(msg) => write!(f, "cannot convert: {}", msg),
        }
    }
}

impl std::error::Error for DynamicDataError {}

/// A structured value bound to the descriptor it was built from.
#[derive(Debug, Clone)]
pub struct DynamicData {
    descriptor: Arc<TypeDescriptor>,
    value: DynamicValue,
}

impl DynamicData {
    /// Fresh instance: optional fields null, required fields zeroed.
    pub fn new(descriptor: &Arc<TypeDescriptor>) -> Self {
        Self {
            descriptor: descriptor.clone(),
            value: DynamicValue::default_for(&descriptor.kind),
        }
    }

    /// Wrap an existing value, checking that it fits the descriptor.
    pub fn from_value(
        descriptor: &Arc<TypeDescriptor>,
        value: DynamicValue,
    ) -> Result<Self, DynamicDataError> {
        if !fits(&descriptor.kind, &value) {
            return Err(DynamicDataError::TypeMismatch {
                expected: descriptor.describe(),
                got: format!("{:?}", value),
            });
        }
        Ok(Self {
            descriptor: descriptor.clone(),
            value,
        })
    }

    /// Build from plain JSON (`{"type": 4, "string": "hello"}`).
    pub fn from_json(
        descriptor: &Arc<TypeDescriptor>,
        json: &serde_json::Value,
    ) -> Result<Self, DynamicDataError> {
        let value = DynamicValue::from_json(json, descriptor)
            .map_err(|e| DynamicDataError::Conversion(e.to_string()))?;
        Ok(Self {
            descriptor: descriptor.clone(),
            value,
        })
    }

    /// Plain JSON view of the value.
    pub fn to_json(&self) -> serde_json::Value {
        self.value.to_json()
    }

    /// Descriptor this instance was built from.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Get the type name.
    pub fn type_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn value(&self) -> &DynamicValue {
        &self.value
    }

    pub fn into_value(self) -> DynamicValue {
        self.value
    }

    /// Typed read of a field; optional fields read as `Option<T>`.
    pub fn get<T: FromDynamicValue>(&self, name: &str) -> Result<T, DynamicDataError> {
        T::from_dynamic(self.get_field(name)?)
    }

    /// Whether an optional field is unset.
    pub fn is_null(&self, name: &str) -> Result<bool, DynamicDataError> {
        self.get_field(name).map(DynamicValue::is_null)
    }

    /// Replace a field value.
    ///
    /// Enum fields accept either the variant name or its numeric value.
    pub fn set<T: IntoDynamicValue>(
        &mut self,
        name: &str,
        value: T,
    ) -> Result<(), DynamicDataError> {
        let field = self
            .descriptor
            .field(name)
            .ok_or_else(|| DynamicDataError::FieldNotFound(name.to_string()))?;

        let dyn_value = coerce(&field.type_desc.kind, value.into_dynamic());
        let accepted = fits(&field.type_desc.kind, &dyn_value)
            || (field.optional && dyn_value.is_null());
        if !accepted {
            return Err(DynamicDataError::TypeMismatch {
                expected: field.type_desc.describe(),
                got: format!("{:?}", dyn_value),
            });
        }

        match &mut self.value {
            DynamicValue::Struct(fields) => {
                fields.insert(name.to_string(), dyn_value);
                Ok(())
            }
            _ => Err(DynamicDataError::InvalidOperation(
                "not a struct".into(),
            )),
        }
    }

    /// Clear an optional field.
    pub fn clear(&mut self, name: &str) -> Result<(), DynamicDataError> {
        self.set(name, DynamicValue::Null)
    }

    /// Get field by name.
    pub fn get_field(&self, name: &str) -> Result<&DynamicValue, DynamicDataError> {
        if self.descriptor.field(name).is_none() {
            return Err(DynamicDataError::FieldNotFound(name.to_string()));
        }

        match &self.value {
            DynamicValue::Struct(fields) => fields
                .get(name)
                .ok_or_else(|| DynamicDataError::FieldNotFound(name.to_string())),
            _ => Err(DynamicDataError::InvalidOperation(
                "not a struct".into(),
            )),
        }
    }

    /// Field names and values, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &DynamicValue)> {
        match &self.value {
            DynamicValue::Struct(fields) => {
                Box::new(fields.iter().map(|(k, v)| (k.as_str(), v))) as Box<dyn Iterator<Item = _>>
            }
            _ => Box::new(std::iter::empty()),
        }
    }
}

impl PartialEq for DynamicData {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor.name == other.descriptor.name && self.value == other.value
    }
}

/// Map convenience inputs onto the field's kind (enum names, widened ints).
fn coerce(kind: &TypeKind, value: DynamicValue) -> DynamicValue {
    match (kind, value) {
        (TypeKind::Nested(inner), value) => coerce(&inner.kind, value),
        (TypeKind::Enum(e), DynamicValue::String(name)) => match e.variant(&name) {
            Some(v) => DynamicValue::Enum(v.value, v.name.clone()),
            None => DynamicValue::String(name),
        },
        (TypeKind::Enum(e), value @ (DynamicValue::I32(_) | DynamicValue::I64(_))) => {
            match value.as_i64().and_then(|n| e.variant_by_value(n)) {
                Some(v) => DynamicValue::Enum(v.value, v.name.clone()),
                None => value,
            }
        }
        (TypeKind::Primitive(PrimitiveKind::I64), DynamicValue::I32(n)) => {
            DynamicValue::I64(i64::from(n))
        }
        (TypeKind::Primitive(PrimitiveKind::F64), DynamicValue::F32(n)) => {
            DynamicValue::F64(f64::from(n))
        }
        (_, value) => value,
    }
}

/// Shape check of a value against a type kind.
pub(crate) fn fits(kind: &TypeKind, value: &DynamicValue) -> bool {
    match (kind, value) {
        (TypeKind::Primitive(p), v) => matches!(
            (p, v),
            (PrimitiveKind::Bool, DynamicValue::Bool(_))
                | (PrimitiveKind::I32, DynamicValue::I32(_))
                | (PrimitiveKind::I64, DynamicValue::I64(_))
                | (PrimitiveKind::U32, DynamicValue::U32(_))
                | (PrimitiveKind::U64, DynamicValue::U64(_))
                | (PrimitiveKind::F32, DynamicValue::F32(_))
                | (PrimitiveKind::F64, DynamicValue::F64(_))
                | (PrimitiveKind::String, DynamicValue::String(_))
                | (PrimitiveKind::Bytes, DynamicValue::Bytes(_))
        ),
        (TypeKind::Struct(fields), DynamicValue::Struct(map)) => {
            map.len() == fields.len()
                && fields.iter().all(|f| match map.get(&f.name) {
                    Some(DynamicValue::Null) => f.optional,
                    Some(v) => fits(&f.type_desc.kind, v),
                    None => false,
                })
        }
        (TypeKind::Sequence(elem), DynamicValue::Sequence(items)) => {
            items.iter().all(|v| fits(&elem.kind, v))
        }
        (TypeKind::Enum(e), DynamicValue::Enum(n, _)) => e.variant_by_value(*n).is_some(),
        (TypeKind::Nested(inner), v) => fits(&inner.kind, v),
        _ => false,
    }
}

/// Typed view of a field value.
pub trait FromDynamicValue: Sized {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError>;
}

/// Values accepted by [`DynamicData::set`].
pub trait IntoDynamicValue {
    fn into_dynamic(self) -> DynamicValue;
}

macro_rules! impl_from_dynamic {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl FromDynamicValue for $ty {
            fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
                match value {
                    DynamicValue::$variant(v) => Ok(*v),
                    other => Err(DynamicDataError::TypeMismatch {
                        expected: $name.to_string(),
                        got: format!("{:?}", other),
                    }),
                }
            }
        }
    };
}

impl_from_dynamic!(bool, Bool, "bool");
impl_from_dynamic!(i32, I32, "int32");
impl_from_dynamic!(u32, U32, "uint32");
impl_from_dynamic!(u64, U64, "uint64");
impl_from_dynamic!(f32, F32, "float");
impl_from_dynamic!(f64, F64, "double");

impl FromDynamicValue for i64 {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
        value.as_i64().ok_or_else(|| DynamicDataError::TypeMismatch {
            expected: "int64".to_string(),
            got: format!("{:?}", value),
        })
    }
}

impl FromDynamicValue for String {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
        match value {
            DynamicValue::String(s) => Ok(s.clone()),
            DynamicValue::Enum(_, name) => Ok(name.clone()),
            other => Err(DynamicDataError::TypeMismatch {
                expected: "string".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }
}

impl FromDynamicValue for Vec<u8> {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
        match value {
            DynamicValue::Bytes(b) => Ok(b.clone()),
            other => Err(DynamicDataError::TypeMismatch {
                expected: "bytes".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }
}

impl<T: FromDynamicValue> FromDynamicValue for Option<T> {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
        match value {
            DynamicValue::Null => Ok(None),
            other => T::from_dynamic(other).map(Some),
        }
    }
}

impl FromDynamicValue for DynamicValue {
    fn from_dynamic(value: &DynamicValue) -> Result<Self, DynamicDataError> {
        Ok(value.clone())
    }
}

macro_rules! impl_into_dynamic {
    ($ty:ty, $variant:ident) => {
        impl IntoDynamicValue for $ty {
            fn into_dynamic(self) -> DynamicValue {
                DynamicValue::$variant(self)
            }
        }
    };
}

impl_into_dynamic!(bool, Bool);
impl_into_dynamic!(i32, I32);
impl_into_dynamic!(i64, I64);
impl_into_dynamic!(u32, U32);
impl_into_dynamic!(u64, U64);
impl_into_dynamic!(f32, F32);
impl_into_dynamic!(f64, F64);
impl_into_dynamic!(String, String);

impl IntoDynamicValue for &str {
    fn into_dynamic(self) -> DynamicValue {
        DynamicValue::String(self.to_string())
    }
}

impl IntoDynamicValue for DynamicValue {
    fn into_dynamic(self) -> DynamicValue {
        self
    }
}

impl IntoDynamicValue for DynamicData {
    fn into_dynamic(self) -> DynamicValue {
        self.value
    }
}

impl<T: IntoDynamicValue> IntoDynamicValue for Vec<T> {
    fn into_dynamic(self) -> DynamicValue {
        DynamicValue::Sequence(self.into_iter().map(IntoDynamicValue::into_dynamic).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumDescriptor, EnumVariant, TypeDescriptorBuilder};
    use serde_json::json;

    fn value_type() -> Arc<TypeDescriptor> {
        Arc::new(
            TypeDescriptorBuilder::new("rst.generic.Value")
                .enum_field(
                    "type",
                    EnumDescriptor::new(vec![
                        EnumVariant::new("DOUBLE", 2),
                        EnumVariant::new("STRING", 4),
                    ]),
                )
                .field("double", PrimitiveKind::F64)
                .string_field("string")
                .repeated_field(
                    "array",
                    Arc::new(TypeDescriptor::primitive(PrimitiveKind::String)),
                )
                .build(),
        )
    }

    #[test]
    fn test_new_has_null_optionals() {
        let data = DynamicData::new(&value_type());
        assert_eq!(data.type_name(), "rst.generic.Value");
        assert!(data.is_null("type").expect("type"));
        assert!(data.is_null("string").expect("string"));
        assert_eq!(data.get::<Option<String>>("string").expect("get"), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut data = DynamicData::new(&value_type());
        data.set("type", "STRING").expect("set enum by name");
        data.set("string", "hello").expect("set string");

        let kind: String = data.get("type").expect("type");
        assert_eq!(kind, "STRING");
        assert_eq!(data.get::<i64>("type").expect("type value"), 4);
        assert_eq!(data.get::<String>("string").expect("string"), "hello");
    }

    #[test]
    fn test_set_enum_by_value() {
        let mut data = DynamicData::new(&value_type());
        data.set("type", 2i32).expect("set enum by value");
        assert_eq!(data.get::<String>("type").expect("type"), "DOUBLE");
    }

    #[test]
    fn test_set_rejects_wrong_kind() {
        let mut data = DynamicData::new(&value_type());
        assert!(matches!(
            data.set("double", "nope"),
            Err(DynamicDataError::TypeMismatch { .. })
        ));
        assert!(matches!(
            data.set("type", "UNKNOWN"),
            Err(DynamicDataError::TypeMismatch { .. })
        ));
        assert!(matches!(
            data.set("missing", 1i32),
            Err(DynamicDataError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_set_sequence_and_clear() {
        let mut data = DynamicData::new(&value_type());
        data.set("array", vec!["a", "b"]).expect("set sequence");
        assert_eq!(
            data.get_field("array").expect("array").as_sequence().map(<[_]>::len),
            Some(2)
        );

        data.set("double", 1.5f64).expect("set");
        data.clear("double").expect("clear");
        assert!(data.is_null("double").expect("double"));
    }

    #[test]
    fn test_json_round_trip() {
        let desc = value_type();
        let data = DynamicData::from_json(&desc, &json!({"type": 4, "string": "hello"}))
            .expect("from json");
        assert_eq!(data.get::<String>("string").expect("string"), "hello");
        assert_eq!(
            data.to_json(),
            json!({"type": "STRING", "double": null, "string": "hello", "array": []})
        );
    }

    #[test]
    fn test_from_value_validates() {
        let desc = value_type();
        assert!(DynamicData::from_value(&desc, DynamicValue::I32(1)).is_err());

        let value = DynamicData::new(&desc).into_value();
        assert!(DynamicData::from_value(&desc, value).is_ok());
    }
}
