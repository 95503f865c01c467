// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message schema parsing and resolution.
//!
//! - [`ast`] - schema data types
//! - [`parser`] - definition-block splitting and the field-line grammar
//! - [`registry`] - per-connection schema collection with three lookup
//!   indices and multi-pass forward-reference resolution
//! - [`md5sum`] - canonical md5 computation over the normalized text

pub mod ast;
pub mod md5sum;
pub mod parser;
pub mod registry;

pub use ast::{FieldKind, FieldSpec, Schema, SchemaField};
pub use parser::parse_registry;
pub use registry::SchemaRegistry;
