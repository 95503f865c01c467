// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema resolution tests over realistic connection-header definitions.

mod common;

use bagcodec::schema::{parse_registry, FieldSpec};
use bagcodec::BagError;
use common::{pointcloud2_definition, SEPARATOR};

#[test]
fn test_pointcloud2_definition_resolves() {
    let registry = parse_registry("sensor_msgs/PointCloud2", &pointcloud2_definition()).unwrap();
    assert_eq!(registry.len(), 3);

    let top = registry.top().unwrap();
    assert_eq!(top.full_name(), "sensor_msgs/PointCloud2");
    let names: Vec<&str> = top.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "header",
            "height",
            "width",
            "fields",
            "is_bigendian",
            "point_step",
            "row_step",
            "data",
            "is_dense"
        ]
    );

    // `Header` resolves by bare name to std_msgs/Header.
    match &top.fields[0].spec {
        FieldSpec::Nested(schema) => {
            assert_eq!(schema.full_name(), "std_msgs/Header");
            assert_eq!(schema.md5, "2176decaecbce78abc3b96ef049fabed");
        }
        other => panic!("expected nested header, got {other:?}"),
    }

    // `PointField[]` resolves to an array of nested messages carrying
    // eight constants and four wire fields.
    match &top.fields[3].spec {
        FieldSpec::Array { element, len } => {
            assert!(len.is_none());
            match element.as_ref() {
                FieldSpec::Nested(schema) => {
                    assert_eq!(schema.full_name(), "sensor_msgs/PointField");
                    let constants =
                        schema.fields.iter().filter(|f| f.constant.is_some()).count();
                    assert_eq!(constants, 8);
                }
                other => panic!("expected nested element, got {other:?}"),
            }
        }
        other => panic!("expected array, got {other:?}"),
    }
}

#[test]
fn test_out_of_order_dependencies_converge() {
    // The simplest type is listed first, so the reverse-order builder
    // needs one extra pass per level before the chain resolves.
    let definition = format!(
        "\
test/Level1 one
{SEPARATOR}
MSG: test/Level3
uint8 value
{SEPARATOR}
MSG: test/Level2
test/Level3 three
{SEPARATOR}
MSG: test/Level1
test/Level2 two"
    );
    let registry = parse_registry("test/Root", &definition).unwrap();
    assert_eq!(registry.len(), 4);
    assert!(registry.lookup("test/Level2").is_ok());
    assert!(registry.lookup("test/Root").is_ok());
}

#[test]
fn test_missing_dependency_reports_invalid_definition() {
    let definition = format!(
        "test/Known k\ntest/Unknown u\n{SEPARATOR}\nMSG: test/Known\nuint8 x"
    );
    let err = parse_registry("test/Root", &definition).unwrap_err();
    assert!(matches!(err, BagError::InvalidDefinition { .. }));
}

#[test]
fn test_md5_lookup_round_trip() {
    let registry = parse_registry("sensor_msgs/PointCloud2", &pointcloud2_definition()).unwrap();
    for schema in registry.schemas() {
        let found = registry.by_md5(&schema.md5).unwrap();
        assert_eq!(found.full_name(), schema.full_name());
    }
}

#[test]
fn test_definitions_with_identical_normal_form_share_md5() {
    let spartan = parse_registry("std_msgs/String", "string data").unwrap();
    let commented = parse_registry(
        "std_msgs/String",
        "# The payload.\n\nstring data   # utf-8\n",
    )
    .unwrap();
    assert_eq!(
        spartan.top().unwrap().md5,
        commented.top().unwrap().md5
    );
}
