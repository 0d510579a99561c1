// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema documents.
//!
//! One structured type per JSON file:
//!
//! ```json
//! {
//!   "name": "rst.generic.Value",
//!   "enums": { "Type": { "INT": 1, "DOUBLE": 2, "STRING": 3, "BOOL": 4 } },
//!   "fields": [
//!     { "name": "type",   "type": "Type",   "optional": true },
//!     { "name": "string", "type": "string" }
//!   ]
//! }
//! ```
//!
//! Enums are either a name → value map or a plain list numbered from zero.

use crate::error::{BridgeError, SchemaError};
use crate::types::{EnumDescriptor, EnumVariant, FieldDescriptor, PrimitiveKind, TypeDescriptor, TypeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A parsed schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Fully-qualified type name.
    pub name: String,

    /// Enums local to this type, by name.
    #[serde(default)]
    pub enums: BTreeMap<String, EnumSpec>,

    /// Fields in declaration order.
    pub fields: Vec<FieldSpec>,
}

/// Enum declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumSpec {
    /// Variants numbered from zero.
    Names(Vec<String>),
    /// Explicit values.
    Values(BTreeMap<String, i64>),
}

impl EnumSpec {
    fn to_descriptor(&self) -> EnumDescriptor {
        let mut variants: Vec<EnumVariant> = match self {
            Self::Names(names) => names
                .iter()
                .zip(0i64..)
                .map(|(name, value)| EnumVariant::new(name.clone(), value))
                .collect(),
            Self::Values(values) => values
                .iter()
                .map(|(name, value)| EnumVariant::new(name.clone(), *value))
                .collect(),
        };
        // first variant is the default, so keep it the lowest value
        variants.sort_by_key(|v| v.value);
        EnumDescriptor::new(variants)
    }
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    /// Scalar keyword, local enum name or dotted structured type name.
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default = "default_optional")]
    pub optional: bool,

    #[serde(default)]
    pub repeated: bool,
}

fn default_optional() -> bool {
    true
}

impl SchemaDocument {
    /// Parse a document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Build the descriptor. Named structured field types are handed to
    /// `nested`, which resolves them through the schema lookup.
    pub fn to_descriptor<F>(&self, mut nested: F) -> Result<TypeDescriptor, BridgeError>
    where
        F: FnMut(&str) -> Result<Arc<TypeDescriptor>, BridgeError>,
    {
        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let element = if let Some(kind) = PrimitiveKind::from_keyword(&spec.field_type) {
                Arc::new(TypeDescriptor::primitive(kind))
            } else if let Some(e) = self.enums.get(&spec.field_type) {
                Arc::new(TypeDescriptor::new(
                    spec.field_type.clone(),
                    TypeKind::Enum(e.to_descriptor()),
                ))
            } else if spec.field_type.is_empty() {
                return Err(SchemaError::UnknownFieldType {
                    type_name: self.name.clone(),
                    field: spec.name.clone(),
                    field_type: spec.field_type.clone(),
                }
                .into());
            } else {
                let inner = nested(&spec.field_type)?;
                Arc::new(TypeDescriptor::new("", TypeKind::Nested(inner)))
            };

            let field = if spec.repeated {
                FieldDescriptor::new(
                    spec.name.clone(),
                    Arc::new(TypeDescriptor::new("", TypeKind::Sequence(element))),
                )
            } else if spec.optional {
                FieldDescriptor::new(spec.name.clone(), element).optional()
            } else {
                FieldDescriptor::new(spec.name.clone(), element)
            };
            fields.push(field);
        }
        Ok(TypeDescriptor::struct_type(self.name.clone(), fields))
    }
}
