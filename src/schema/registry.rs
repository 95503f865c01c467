// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-connection schema registry.
//!
//! One registry is built per connection from the connection header's
//! embedded definition text. Schemas are indexed three ways: by bare
//! name, by `(package, name)`, and by canonical md5. Nested references
//! in field lines may omit the package, so lookup falls back from the
//! package-qualified form to the bare name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{BagError, Result};
use crate::schema::ast::Schema;

/// A closed collection of interdependent message schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    top_type: String,
    schemas: Vec<Arc<Schema>>,
    by_name: HashMap<String, Arc<Schema>>,
    by_package: HashMap<(String, String), Arc<Schema>>,
    by_md5: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// An empty registry for the given top-level type. Used as the
    /// starting state for the parser and for connections whose
    /// definitions failed to parse.
    pub(crate) fn new(top_type: &str) -> Self {
        Self {
            top_type: top_type.to_string(),
            ..Default::default()
        }
    }

    /// The type transmitted on the owning connection, e.g.
    /// `sensor_msgs/PointCloud2`.
    pub fn top_type(&self) -> &str {
        &self.top_type
    }

    /// Register a schema under all three indices.
    pub(crate) fn insert(&mut self, schema: Arc<Schema>) {
        self.by_name
            .insert(schema.name.clone(), Arc::clone(&schema));
        self.by_package.insert(
            (schema.package.clone(), schema.name.clone()),
            Arc::clone(&schema),
        );
        self.by_md5.insert(schema.md5.clone(), Arc::clone(&schema));
        self.schemas.push(schema);
    }

    /// Look up by bare message name, e.g. `Header`.
    pub fn by_name(&self, name: &str) -> Result<Arc<Schema>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| BagError::unknown_message(name))
    }

    /// Look up by package and message name.
    pub fn by_package(&self, package: &str, name: &str) -> Result<Arc<Schema>> {
        self.by_package
            .get(&(package.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| BagError::unknown_message(format!("{package}/{name}")))
    }

    /// Look up by canonical md5 sum.
    pub fn by_md5(&self, md5: &str) -> Result<Arc<Schema>> {
        self.by_md5
            .get(md5)
            .cloned()
            .ok_or_else(|| BagError::unknown_message(md5))
    }

    /// Resolve a type reference as written in a field line: either
    /// `package/Name` or a bare `Name`.
    pub fn lookup(&self, type_ref: &str) -> Result<Arc<Schema>> {
        let parts: Vec<&str> = type_ref
            .split('/')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        match parts.as_slice() {
            [name] => self.by_name(name),
            [package, name] => self.by_package(package, name),
            _ => Err(BagError::unknown_message(type_ref)),
        }
    }

    /// The schema of the connection's top-level type.
    pub fn top(&self) -> Result<Arc<Schema>> {
        self.lookup(&self.top_type)
    }

    /// All registered schemas, in construction order (simplest
    /// dependencies first).
    pub fn schemas(&self) -> &[Arc<Schema>] {
        &self.schemas
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry holds no schemas.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
