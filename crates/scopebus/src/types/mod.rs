// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured types
//!
//! Runtime descriptions of schema-defined message types and a data container
//! that can hold any of them.
//!
//! # Features
//!
//! - **TypeDescriptor**: runtime type description (primitives, structs, enums, repeated)
//! - **DynamicData**: type-erased data container with field access and JSON conversion
//! - **Builder API**: fluent interface for building type descriptors
//! - **Wire Support**: encode/decode DynamicData to/from the binary payload format
//! - **Schema lookup**: JSON schema documents found via an ordered directory search
//!
//! # Example
//!
//! ```rust
//! use scopebus::types::{DynamicData, PrimitiveKind, TypeDescriptorBuilder};
//! use std::sync::Arc;
//!
//! let descriptor = Arc::new(TypeDescriptorBuilder::new("sensors.Reading")
//!     .field("sensor_id", PrimitiveKind::U32)
//!     .field("temperature", PrimitiveKind::F64)
//!     .build());
//!
//! let mut data = DynamicData::new(&descriptor);
//! assert!(data.is_null("temperature").unwrap());
//!
//! data.set("temperature", 23.5f64).unwrap();
//! let temp: f64 = data.get("temperature").unwrap();
//! assert_eq!(temp, 23.5);
//! ```

mod builder;
mod data;
mod descriptor;
mod resolver;
mod schema_file;
mod value;
pub mod wire;

pub use builder::TypeDescriptorBuilder;
pub use data::{DynamicData, DynamicDataError, FromDynamicValue, IntoDynamicValue};
pub use descriptor::{
    EnumDescriptor, EnumVariant, FieldDescriptor, PrimitiveKind, TypeDescriptor, TypeKind,
};
pub use resolver::{
    FsSchemaLoader, MemorySchemaLoader, SchemaLoader, SchemaResolver, FALLBACK_DIRS,
    SCHEMA_EXTENSION,
};
pub use schema_file::{EnumSpec, FieldSpec, SchemaDocument};
pub use value::{ConversionError, DynamicValue};
