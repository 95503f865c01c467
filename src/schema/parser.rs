// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message definition parsing.
//!
//! A connection header carries the definition of the message type
//! transmitted on that connection followed by the definitions of every
//! message it depends on, separated by a line of 80 `=` characters. The
//! top definition has no `MSG:` banner, so one is prepended before
//! splitting.
//!
//! Definitions print the most complex message first and its simplest
//! dependencies last, so blocks are built in reverse order. A block that
//! references a type not yet built is set aside and retried on the next
//! pass; a pass that makes no progress means the definition list cannot
//! converge.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::core::{BagError, Result};
use crate::schema::ast::{FieldKind, FieldSpec, Schema, SchemaField};
use crate::schema::md5sum;
use crate::schema::registry::SchemaRegistry;

/// The block separator between message definitions: exactly 80 `=`.
pub const DEFINITION_SEPARATOR: &str =
    "================================================================================";

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([\w/\[\]]+)\s+(\w+)\s*(?:=\s*(\S+))?.*$").unwrap())
}

fn array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([\w/]+)\[(\d*)\]$").unwrap())
}

/// Parse a connection's full definition text into a closed registry.
pub fn parse_registry(top_type: &str, definition: &str) -> Result<SchemaRegistry> {
    let prefixed = format!("MSG: {top_type}\n{definition}");
    let blocks: Vec<&str> = prefixed
        .split(DEFINITION_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect();

    let mut registry = SchemaRegistry::new(top_type);

    // Reverse order: the simplest dependencies come last in the file and
    // are built first.
    let mut pending: Vec<&str> = blocks.into_iter().rev().collect();
    let mut pass = 0usize;
    while !pending.is_empty() {
        pass += 1;
        let before = pending.len();
        let mut unresolved = Vec::new();

        for block in pending {
            match build_schema(block, &registry) {
                Ok(schema) => {
                    debug!(
                        schema = %schema.full_name(),
                        pass,
                        "constructed message schema"
                    );
                    registry.insert(Arc::new(schema));
                }
                Err(BagError::UnknownMessage { .. }) => {
                    // The block references a type we have not built yet;
                    // it may appear in a later pass.
                    unresolved.push(block);
                }
                Err(other) => return Err(other),
            }
        }

        if unresolved.len() == before {
            return Err(BagError::invalid_definition(format!(
                "unable to resolve {} message definition(s) for {top_type}",
                unresolved.len()
            )));
        }
        pending = unresolved;
    }

    Ok(registry)
}

/// Build one schema from a single `MSG:`-prefixed definition block.
///
/// Returns `UnknownMessage` when the block references a type absent from
/// `registry`; the caller treats that as "retry later".
fn build_schema(block: &str, registry: &SchemaRegistry) -> Result<Schema> {
    let mut lines = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty());

    let banner = lines
        .next()
        .ok_or_else(|| BagError::invalid_definition("message definition had no lines"))?;
    let type_str = banner
        .strip_prefix("MSG: ")
        .ok_or_else(|| {
            BagError::invalid_definition(format!(
                "message definition did not start with \"MSG: \": {banner}"
            ))
        })?
        .trim();

    let parts: Vec<&str> = type_str
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let [package, name] = parts.as_slice() else {
        return Err(BagError::invalid_definition(format!(
            "unable to parse message type: \"{type_str}\""
        )));
    };

    let mut fields = Vec::new();
    for line in lines {
        if line.starts_with('#') {
            continue;
        }
        let caps = field_re().captures(line).ok_or_else(|| {
            BagError::invalid_definition(format!("unable to parse field definition: {line}"))
        })?;
        let field_type = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let field_name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let default = caps.get(3).map(|m| m.as_str());

        fields.push(build_field(field_type, field_name, default, registry)?);
    }

    let md5 = md5sum::canonical_md5(block, registry)?;

    Ok(Schema {
        package: package.to_string(),
        name: name.to_string(),
        md5,
        fields,
    })
}

/// Build one field from its type token, name, and optional constant value.
fn build_field(
    type_str: &str,
    name: &str,
    default: Option<&str>,
    registry: &SchemaRegistry,
) -> Result<SchemaField> {
    let (base_type, array_len, is_array) = match array_re().captures(type_str) {
        Some(caps) => {
            let base = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let digits = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let len = if digits.is_empty() {
                None
            } else {
                Some(digits.parse::<u32>().map_err(|_| {
                    BagError::invalid_definition(format!("bad array length in: {type_str}"))
                })?)
            };
            (base.to_string(), len, true)
        }
        None => (type_str.to_string(), None, false),
    };

    let element = match FieldKind::try_from_str(&base_type) {
        Some(kind) => FieldSpec::Primitive(kind),
        None => FieldSpec::Nested(registry.lookup(&base_type)?),
    };

    // Constants only make sense on scalar primitives; a default on an
    // array or nested field is ignored, matching upstream readers.
    let constant = match (&element, is_array, default) {
        (FieldSpec::Primitive(kind), false, Some(text)) => Some(kind.parse_constant(text)?),
        _ => None,
    };

    let spec = if is_array {
        FieldSpec::Array {
            element: Box::new(element),
            len: array_len,
        }
    } else {
        element
    };

    Ok(SchemaField {
        name: name.to_string(),
        spec,
        constant,
    })
}
