// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for TypeDescriptor.

use crate::types::{EnumDescriptor, FieldDescriptor, PrimitiveKind, TypeDescriptor, TypeKind};
use std::sync::Arc;

/// Builder for struct TypeDescriptor instances.
///
/// Fields added through the builder are optional unless added with one of
/// the `required_*` methods, matching how schema documents declare them.
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Create a new builder for a struct type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add an optional primitive field.
    pub fn field(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.field_with_type(name, Arc::new(TypeDescriptor::primitive(kind)))
    }

    /// Add a required primitive field.
    pub fn required_field(mut self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        let type_desc = Arc::new(TypeDescriptor::primitive(kind));
        self.fields.push(FieldDescriptor::new(name, type_desc));
        self
    }

    /// Add an optional field with a type descriptor.
    pub fn field_with_type(
        mut self,
        name: impl Into<String>,
        type_desc: Arc<TypeDescriptor>,
    ) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, type_desc).optional());
        self
    }

    /// Add a string field.
    pub fn string_field(self, name: impl Into<String>) -> Self {
        self.field(name, PrimitiveKind::String)
    }

    /// Add an optional enum field.
    pub fn enum_field(self, name: impl Into<String>, desc: EnumDescriptor) -> Self {
        let type_desc = Arc::new(TypeDescriptor::new("", TypeKind::Enum(desc)));
        self.field_with_type(name, type_desc)
    }

    /// Add a repeated field. Repeated fields are never null; unset is empty.
    pub fn repeated_field(mut self, name: impl Into<String>, element: Arc<TypeDescriptor>) -> Self {
        let type_desc = Arc::new(TypeDescriptor::new("", TypeKind::Sequence(element)));
        self.fields.push(FieldDescriptor::new(name, type_desc));
        self
    }

    /// Add an optional nested struct field.
    pub fn nested_field(self, name: impl Into<String>, nested: Arc<TypeDescriptor>) -> Self {
        let type_desc = Arc::new(TypeDescriptor::new("", TypeKind::Nested(nested)));
        self.field_with_type(name, type_desc)
    }

    /// Build the TypeDescriptor.
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::struct_type(self.name, self.fields)
    }
}
