// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type descriptors for structured payloads.

use std::sync::Arc;

/// Scalar kinds a structured field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
}

impl PrimitiveKind {
    /// Parse a schema keyword (`int32`, `double`, ...).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "bool" => Some(Self::Bool),
            "int32" | "sint32" | "sfixed32" => Some(Self::I32),
            "int64" | "sint64" | "sfixed64" => Some(Self::I64),
            "uint32" | "fixed32" => Some(Self::U32),
            "uint64" | "fixed64" => Some(Self::U64),
            "float" => Some(Self::F32),
            "double" => Some(Self::F64),
            "string" => Some(Self::String),
            "bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Schema keyword for this kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

/// Type kind enumeration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// Scalar value.
    Primitive(PrimitiveKind),
    /// Struct with named fields.
    Struct(Vec<FieldDescriptor>),
    /// Repeated values of one element type.
    Sequence(Arc<TypeDescriptor>),
    /// Named integer constants.
    Enum(EnumDescriptor),
    /// Reference to another structured type.
    Nested(Arc<TypeDescriptor>),
}

/// A complete type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Fully-qualified type name (`rst.generic.Value`); empty for anonymous
    /// field types.
    pub name: String,
    /// Type kind.
    pub kind: TypeKind,
}

impl TypeDescriptor {
    /// Create a new type descriptor.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create an anonymous primitive type descriptor.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new("", TypeKind::Primitive(kind))
    }

    /// Create a struct type descriptor.
    pub fn struct_type(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::new(name, TypeKind::Struct(fields))
    }

    /// Check if this is a struct type.
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct(_))
    }

    /// Get fields if this is a struct.
    pub fn fields(&self) -> Option<&[FieldDescriptor]> {
        match &self.kind {
            TypeKind::Struct(fields) => Some(fields),
            TypeKind::Nested(inner) => inner.fields(),
            _ => None,
        }
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// Human-readable kind, used in error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TypeKind::Primitive(p) => p.keyword().to_string(),
            TypeKind::Struct(_) | TypeKind::Nested(_) if !self.name.is_empty() => {
                self.name.clone()
            }
            TypeKind::Struct(_) => "struct".to_string(),
            TypeKind::Nested(inner) => inner.describe(),
            TypeKind::Sequence(elem) => format!("repeated {}", elem.describe()),
            TypeKind::Enum(_) => "enum".to_string(),
        }
    }
}

/// Field descriptor for struct members.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Field type.
    pub type_desc: Arc<TypeDescriptor>,
    /// Unset fields stay null instead of taking the kind's zero value.
    pub optional: bool,
}

impl FieldDescriptor {
    /// Create a new (required) field descriptor.
    pub fn new(name: impl Into<String>, type_desc: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            type_desc,
            optional: false,
        }
    }

    /// Mark as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Enumeration type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDescriptor {
    /// Enum variants.
    pub variants: Vec<EnumVariant>,
}

impl EnumDescriptor {
    /// Create enum descriptor.
    pub fn new(variants: Vec<EnumVariant>) -> Self {
        Self { variants }
    }

    /// Get variant by name.
    pub fn variant(&self, name: &str) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Get variant by value.
    pub fn variant_by_value(&self, value: i64) -> Option<&EnumVariant> {
        self.variants.iter().find(|v| v.value == value)
    }
}

/// Enum variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    /// Variant name.
    pub name: String,
    /// Variant value.
    pub value: i64,
}

impl EnumVariant {
    /// Create enum variant.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_round_trip() {
        for kind in [
            PrimitiveKind::Bool,
            PrimitiveKind::I32,
            PrimitiveKind::I64,
            PrimitiveKind::U32,
            PrimitiveKind::U64,
            PrimitiveKind::F32,
            PrimitiveKind::F64,
            PrimitiveKind::String,
            PrimitiveKind::Bytes,
        ] {
            assert_eq!(PrimitiveKind::from_keyword(kind.keyword()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_keyword("sint64"), Some(PrimitiveKind::I64));
        assert_eq!(PrimitiveKind::from_keyword("rst.generic.Value"), None);
    }

    #[test]
    fn test_field_lookup() {
        let desc = TypeDescriptor::struct_type(
            "geometry.Point",
            vec![
                FieldDescriptor::new("x", Arc::new(TypeDescriptor::primitive(PrimitiveKind::F64))),
                FieldDescriptor::new("y", Arc::new(TypeDescriptor::primitive(PrimitiveKind::F64)))
                    .optional(),
            ],
        );

        assert!(desc.is_struct());
        assert!(!desc.field("x").expect("x").optional);
        assert!(desc.field("y").expect("y").optional);
        assert!(desc.field("z").is_none());
        assert_eq!(desc.describe(), "geometry.Point");
    }

    #[test]
    fn test_enum_lookup() {
        let e = EnumDescriptor::new(vec![EnumVariant::new("INT", 1), EnumVariant::new("BOOL", 4)]);
        assert_eq!(e.variant("BOOL").map(|v| v.value), Some(4));
        assert_eq!(e.variant_by_value(1).map(|v| v.name.as_str()), Some("INT"));
        assert!(e.variant_by_value(9).is_none());
    }
}
