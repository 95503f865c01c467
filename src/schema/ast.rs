// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema types for parsed message definitions.

use std::fmt;
use std::sync::Arc;

use crate::core::{BagError, FieldValue, Result};

/// Primitive wire types.
///
/// `byte` is an alias for `int8` and `char` an alias for `uint8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    /// ROS timestamp: `(sec: u32, nsec: u32)`
    Time,
    /// ROS duration: `(sec: i32, nsec: i32)`
    Duration,
}

impl FieldKind {
    /// Parse a primitive type name. Returns `None` for nested types.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s {
            "bool" => Some(FieldKind::Bool),
            "int8" | "byte" => Some(FieldKind::Int8),
            "uint8" | "char" => Some(FieldKind::UInt8),
            "int16" => Some(FieldKind::Int16),
            "uint16" => Some(FieldKind::UInt16),
            "int32" => Some(FieldKind::Int32),
            "uint32" => Some(FieldKind::UInt32),
            "int64" => Some(FieldKind::Int64),
            "uint64" => Some(FieldKind::UInt64),
            "float32" => Some(FieldKind::Float32),
            "float64" => Some(FieldKind::Float64),
            "string" => Some(FieldKind::String),
            "time" => Some(FieldKind::Time),
            "duration" => Some(FieldKind::Duration),
            _ => None,
        }
    }

    /// The number of bytes one value occupies on the wire, if fixed.
    /// Strings are length-prefixed and have no fixed size.
    pub const fn wire_size(self) -> Option<usize> {
        match self {
            FieldKind::Bool | FieldKind::Int8 | FieldKind::UInt8 => Some(1),
            FieldKind::Int16 | FieldKind::UInt16 => Some(2),
            FieldKind::Int32 | FieldKind::UInt32 | FieldKind::Float32 => Some(4),
            FieldKind::Int64 | FieldKind::UInt64 | FieldKind::Float64 => Some(8),
            FieldKind::Time | FieldKind::Duration => Some(8),
            FieldKind::String => None,
        }
    }

    /// Parse a constant's textual value into a typed [`FieldValue`].
    pub fn parse_constant(self, text: &str) -> Result<FieldValue> {
        let bad = || {
            BagError::invalid_definition(format!(
                "cannot parse '{text}' as a {self} constant"
            ))
        };
        match self {
            FieldKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(FieldValue::Bool(true)),
                "false" => Ok(FieldValue::Bool(false)),
                other => other
                    .parse::<i64>()
                    .map(|v| FieldValue::Bool(v != 0))
                    .map_err(|_| bad()),
            },
            FieldKind::Int8 => text.parse().map(FieldValue::Int8).map_err(|_| bad()),
            FieldKind::Int16 => text.parse().map(FieldValue::Int16).map_err(|_| bad()),
            FieldKind::Int32 => text.parse().map(FieldValue::Int32).map_err(|_| bad()),
            FieldKind::Int64 => text.parse().map(FieldValue::Int64).map_err(|_| bad()),
            FieldKind::UInt8 => text.parse().map(FieldValue::UInt8).map_err(|_| bad()),
            FieldKind::UInt16 => text.parse().map(FieldValue::UInt16).map_err(|_| bad()),
            FieldKind::UInt32 => text.parse().map(FieldValue::UInt32).map_err(|_| bad()),
            FieldKind::UInt64 => text.parse().map(FieldValue::UInt64).map_err(|_| bad()),
            FieldKind::Float32 => text.parse().map(FieldValue::Float32).map_err(|_| bad()),
            FieldKind::Float64 => text.parse().map(FieldValue::Float64).map_err(|_| bad()),
            FieldKind::String => Ok(FieldValue::String(text.to_string())),
            FieldKind::Time | FieldKind::Duration => Err(BagError::invalid_definition(
                format!("{self} fields cannot be constants"),
            )),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Bool => "bool",
            FieldKind::Int8 => "int8",
            FieldKind::Int16 => "int16",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt8 => "uint8",
            FieldKind::UInt16 => "uint16",
            FieldKind::UInt32 => "uint32",
            FieldKind::UInt64 => "uint64",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::String => "string",
            FieldKind::Time => "time",
            FieldKind::Duration => "duration",
        };
        f.write_str(name)
    }
}

/// A field's wire shape: primitive, array, or nested message.
///
/// Nested references hold the resolved schema, so a fully constructed
/// spec tree is closed over its registry by construction.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    /// A single primitive value
    Primitive(FieldKind),
    /// An array of elements; `len` is `Some` for fixed-length arrays and
    /// `None` for variable-length arrays (length-prefixed on the wire)
    Array {
        element: Box<FieldSpec>,
        len: Option<u32>,
    },
    /// An embedded message
    Nested(Arc<Schema>),
}

impl FieldSpec {
    /// The type name as written in a definition, e.g. `uint8`,
    /// `float32[9]`, `geometry_msgs/Vector3`.
    pub fn type_name(&self) -> String {
        match self {
            FieldSpec::Primitive(kind) => kind.to_string(),
            FieldSpec::Array { element, len } => match len {
                Some(n) => format!("{}[{n}]", element.type_name()),
                None => format!("{}[]", element.type_name()),
            },
            FieldSpec::Nested(schema) => schema.full_name(),
        }
    }
}

/// One field in a message schema.
#[derive(Debug, Clone)]
pub struct SchemaField {
    /// Field name
    pub name: String,
    /// Wire shape
    pub spec: FieldSpec,
    /// Constant value, for `TYPE NAME=VALUE` lines. Constant fields do
    /// not consume payload bytes.
    pub constant: Option<FieldValue>,
}

/// A parsed message schema: package, name, canonical md5, ordered fields.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Package the message lives in, e.g. `std_msgs`
    pub package: String,
    /// Message name without the package, e.g. `Header`
    pub name: String,
    /// Canonical md5 of the normalized definition, lowercase hex
    pub md5: String,
    /// Fields in declaration order
    pub fields: Vec<SchemaField>,
}

impl Schema {
    /// The package-qualified name, e.g. `std_msgs/Header`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.package, self.name)
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
