// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema lookup.
//!
//! A structured type name maps to a relative file path (`rst.generic.Value`
//! → `rst/generic/Value.json`) which is tried under the root, then under
//! `<root>/sandbox`, then under `<root>/stable`.

use crate::error::{BridgeError, SchemaError};
use crate::types::{SchemaDocument, TypeDescriptor};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Schema file extension.
pub const SCHEMA_EXTENSION: &str = "json";

/// Fallback directories under the root, tried in order after the root itself.
pub const FALLBACK_DIRS: [&str; 2] = ["sandbox", "stable"];

/// Source of schema documents.
pub trait SchemaLoader: Send + Sync {
    /// Load the document at `path`, or `Ok(None)` if nothing is there.
    fn load(&self, path: &Path) -> Result<Option<SchemaDocument>, SchemaError>;
}

/// Loads schema documents from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSchemaLoader;

impl SchemaLoader for FsSchemaLoader {
    fn load(&self, path: &Path) -> Result<Option<SchemaDocument>, SchemaError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SchemaError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        SchemaDocument::from_json(&text)
            .map(Some)
            .map_err(|source| SchemaError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// In-memory schema documents keyed by full path.
#[derive(Debug, Default)]
pub struct MemorySchemaLoader {
    documents: DashMap<PathBuf, SchemaDocument>,
}

impl MemorySchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a document at `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, document: SchemaDocument) {
        self.documents.insert(path.into(), document);
    }

    /// Parse and place a JSON document at `path`.
    pub fn insert_json(&self, path: impl Into<PathBuf>, json: &str) -> Result<(), SchemaError> {
        let path = path.into();
        let document = SchemaDocument::from_json(json).map_err(|source| SchemaError::Parse {
            path: path.clone(),
            source,
        })?;
        self.documents.insert(path, document);
        Ok(())
    }
}

impl SchemaLoader for MemorySchemaLoader {
    fn load(&self, path: &Path) -> Result<Option<SchemaDocument>, SchemaError> {
        Ok(self.documents.get(path).map(|doc| doc.clone()))
    }
}

/// Resolves structured type names to descriptors via the ordered lookup.
pub struct SchemaResolver {
    root: PathBuf,
    loader: Arc<dyn SchemaLoader>,
}

impl std::fmt::Debug for SchemaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaResolver")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl SchemaResolver {
    pub fn new(root: impl Into<PathBuf>, loader: Arc<dyn SchemaLoader>) -> Self {
        Self {
            root: root.into(),
            loader,
        }
    }

    /// Resolver reading from the filesystem under `root`.
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(FsSchemaLoader))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative file for a type name.
    pub fn relative_path(type_name: &str) -> PathBuf {
        let mut path = PathBuf::from(type_name.replace('.', "/"));
        path.set_extension(SCHEMA_EXTENSION);
        path
    }

    /// Candidate locations for a type name, in lookup order.
    pub fn locations(&self, type_name: &str) -> Vec<PathBuf> {
        let file = Self::relative_path(type_name);
        std::iter::once(self.root.clone())
            .chain(FALLBACK_DIRS.iter().map(|dir| self.root.join(dir)))
            .map(|root| root.join(&file))
            .collect()
    }

    /// First document found along the lookup order.
    pub fn find(&self, type_name: &str) -> Result<(PathBuf, SchemaDocument), BridgeError> {
        let tried = self.locations(type_name);
        for path in &tried {
            if let Some(document) = self.loader.load(path)? {
                if document.name != type_name {
                    return Err(SchemaError::NameMismatch {
                        expected: type_name.to_string(),
                        found: document.name,
                    }
                    .into());
                }
                return Ok((path.clone(), document));
            }
        }
        Err(BridgeError::SchemaNotFound {
            type_name: type_name.to_string(),
            tried,
        })
    }

    /// Resolve a type name and everything it refers to.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<TypeDescriptor>, BridgeError> {
        let mut resolved = HashMap::new();
        self.resolve_with(type_name, &mut Vec::new(), &mut resolved)
    }

    fn resolve_with(
        &self,
        type_name: &str,
        visiting: &mut Vec<String>,
        resolved: &mut HashMap<String, Arc<TypeDescriptor>>,
    ) -> Result<Arc<TypeDescriptor>, BridgeError> {
        if let Some(desc) = resolved.get(type_name) {
            return Ok(desc.clone());
        }
        if visiting.iter().any(|name| name == type_name) {
            return Err(SchemaError::Recursive(type_name.to_string()).into());
        }

        let (path, document) = self.find(type_name)?;
        debug!("Loaded schema for '{}' from {}", type_name, path.display());

        visiting.push(type_name.to_string());
        let descriptor = document.to_descriptor(|nested| self.resolve_with(nested, visiting, resolved));
        visiting.pop();

        let descriptor = Arc::new(descriptor?);
        resolved.insert(type_name.to_string(), descriptor.clone());
        Ok(descriptor)
    }
}
