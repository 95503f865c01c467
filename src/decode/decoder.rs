// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema-driven decoder trees.
//!
//! A [`MessageDecoder`] is built once per message type per connection
//! and reused for every message on that connection: decoding is
//! destructive (`reset` + `decode`), and the decoded values live inside
//! the tree until the next decode. Building a tree is expensive; cloning
//! one yields a structurally independent tree with no shared mutable
//! state.
//!
//! Arrays of fixed-width primitives are read in bulk and kept as raw
//! little-endian bytes; the typed accessors decode them on extraction.
//! Strings and nested messages are decoded element by element at parse
//! time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{BagDuration, BagError, BagTime, FieldValue, Result};
use crate::decode::cursor::PayloadCursor;
use crate::schema::ast::{FieldKind, FieldSpec, Schema};

/// Cap on a single decoded array, guarding against corrupt length words.
const MAX_ARRAY_LEN: usize = 10_000_000;

/// A decoder (and value holder) for one message type.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    package: String,
    name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
}

/// One named field inside a message decoder.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    node: FieldNode,
}

#[derive(Debug, Clone)]
enum FieldNode {
    Primitive(PrimitiveField),
    Array(ArrayField),
    Message(MessageDecoder),
}

/// A scalar field; holds the decoded value between decodes.
#[derive(Debug, Clone)]
struct PrimitiveField {
    kind: FieldKind,
    /// Constant value for `TYPE NAME=VALUE` fields; constants never
    /// consume payload bytes.
    default: Option<FieldValue>,
    value: Option<FieldValue>,
}

/// Element shape of an array field.
#[derive(Debug, Clone)]
enum ArrayElement {
    Primitive(FieldKind),
    Message(Box<MessageDecoder>),
}

/// An array field. Fixed-width primitive elements are stored packed;
/// strings and nested messages are stored decoded.
#[derive(Debug, Clone)]
pub struct ArrayField {
    element: ArrayElement,
    fixed_len: Option<u32>,
    storage: ArrayStorage,
    decoded: bool,
}

#[derive(Debug, Clone)]
enum ArrayStorage {
    Empty,
    /// Raw little-endian bytes of `len * wire_size` elements
    Packed(Vec<u8>),
    Strings(Vec<String>),
    Messages(Vec<MessageDecoder>),
}

impl MessageDecoder {
    /// Build a decoder tree for a resolved schema.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut index = HashMap::with_capacity(schema.fields.len());

        for schema_field in &schema.fields {
            let node = FieldNode::from_spec(&schema_field.spec, schema_field.constant.clone());
            index.insert(schema_field.name.clone(), fields.len());
            fields.push(Field {
                name: schema_field.name.clone(),
                node,
            });
        }

        Self {
            package: schema.package.clone(),
            name: schema.name.clone(),
            fields,
            index,
        }
    }

    /// The message's package, e.g. `sensor_msgs`.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// The message name without the package, e.g. `PointCloud2`.
    pub fn type_name(&self) -> &str {
        &self.name
    }

    /// The package-qualified name.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.package, self.name)
    }

    /// Clear all values from a previous decode. Constant fields reset to
    /// their constant value.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.node.reset();
        }
    }

    /// Decode one serialized payload into this tree. Call [`reset`]
    /// first when reusing the decoder.
    ///
    /// [`reset`]: MessageDecoder::reset
    pub fn decode(&mut self, data: &[u8]) -> Result<()> {
        let mut cursor = PayloadCursor::new(data);
        self.decode_from(&mut cursor)
    }

    fn decode_from(&mut self, cursor: &mut PayloadCursor<'_>) -> Result<()> {
        for field in &mut self.fields {
            field.node.decode(cursor)?;
        }
        Ok(())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Result<&Field> {
        match self.index.get(name) {
            Some(&i) => Ok(&self.fields[i]),
            None => {
                let mut names: Vec<&str> = self.index.keys().map(|k| k.as_str()).collect();
                names.sort_unstable();
                Err(BagError::unknown_field(name, names.join(",")))
            }
        }
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl FieldNode {
    fn from_spec(spec: &FieldSpec, constant: Option<FieldValue>) -> Self {
        match spec {
            FieldSpec::Primitive(kind) => FieldNode::Primitive(PrimitiveField {
                kind: *kind,
                value: constant.clone(),
                default: constant,
            }),
            FieldSpec::Array { element, len } => FieldNode::Array(ArrayField {
                element: ArrayElement::from_spec(element),
                fixed_len: *len,
                storage: ArrayStorage::Empty,
                decoded: false,
            }),
            FieldSpec::Nested(schema) => FieldNode::Message(MessageDecoder::from_schema(schema)),
        }
    }

    fn reset(&mut self) {
        match self {
            FieldNode::Primitive(p) => p.value = p.default.clone(),
            FieldNode::Array(a) => {
                a.storage = ArrayStorage::Empty;
                a.decoded = false;
            }
            FieldNode::Message(m) => m.reset(),
        }
    }

    fn decode(&mut self, cursor: &mut PayloadCursor<'_>) -> Result<()> {
        match self {
            FieldNode::Primitive(p) => p.decode(cursor),
            FieldNode::Array(a) => a.decode(cursor),
            FieldNode::Message(m) => m.decode_from(cursor),
        }
    }
}

impl ArrayElement {
    fn from_spec(spec: &FieldSpec) -> Self {
        match spec {
            FieldSpec::Primitive(kind) => ArrayElement::Primitive(*kind),
            FieldSpec::Nested(schema) => {
                ArrayElement::Message(Box::new(MessageDecoder::from_schema(schema)))
            }
            // The field grammar cannot produce an array of arrays.
            FieldSpec::Array { element, .. } => ArrayElement::from_spec(element),
        }
    }
}

impl PrimitiveField {
    fn decode(&mut self, cursor: &mut PayloadCursor<'_>) -> Result<()> {
        if self.default.is_some() {
            // Constants are not part of the wire format.
            return Ok(());
        }
        self.value = Some(match self.kind {
            FieldKind::Bool => FieldValue::Bool(cursor.read_bool()?),
            FieldKind::Int8 => FieldValue::Int8(cursor.read_i8()?),
            FieldKind::UInt8 => FieldValue::UInt8(cursor.read_u8()?),
            FieldKind::Int16 => FieldValue::Int16(cursor.read_i16()?),
            FieldKind::UInt16 => FieldValue::UInt16(cursor.read_u16()?),
            FieldKind::Int32 => FieldValue::Int32(cursor.read_i32()?),
            FieldKind::UInt32 => FieldValue::UInt32(cursor.read_u32()?),
            FieldKind::Int64 => FieldValue::Int64(cursor.read_i64()?),
            FieldKind::UInt64 => FieldValue::UInt64(cursor.read_u64()?),
            FieldKind::Float32 => FieldValue::Float32(cursor.read_f32()?),
            FieldKind::Float64 => FieldValue::Float64(cursor.read_f64()?),
            FieldKind::String => FieldValue::String(cursor.read_string()?),
            FieldKind::Time => FieldValue::Time(cursor.read_time()?),
            FieldKind::Duration => FieldValue::Duration(cursor.read_duration()?),
        });
        Ok(())
    }
}

impl Field {
    /// The field's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's type name as written in the definition.
    pub fn type_name(&self) -> String {
        match &self.node {
            FieldNode::Primitive(p) => p.kind.to_string(),
            FieldNode::Array(a) => {
                let base = match &a.element {
                    ArrayElement::Primitive(kind) => kind.to_string(),
                    ArrayElement::Message(m) => m.full_name(),
                };
                match a.fixed_len {
                    Some(n) => format!("{base}[{n}]"),
                    None => format!("{base}[]"),
                }
            }
            FieldNode::Message(m) => m.full_name(),
        }
    }

    /// The decoded primitive value. Fails with `UninitializedField` if no
    /// message has been decoded, and for array or nested fields.
    pub fn value(&self) -> Result<&FieldValue> {
        match &self.node {
            FieldNode::Primitive(p) => p
                .value
                .as_ref()
                .ok_or_else(|| BagError::uninitialized(&self.name)),
            _ => Err(BagError::uninitialized(&self.name)),
        }
    }

    /// The nested message, for message-typed fields.
    pub fn as_message(&self) -> Option<&MessageDecoder> {
        match &self.node {
            FieldNode::Message(m) => Some(m),
            _ => None,
        }
    }

    /// The array view, for array-typed fields.
    pub fn as_array(&self) -> Option<&ArrayField> {
        match &self.node {
            FieldNode::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl ArrayField {
    fn element_wire_size(&self) -> Option<usize> {
        match &self.element {
            ArrayElement::Primitive(kind) => kind.wire_size(),
            ArrayElement::Message(_) => None,
        }
    }

    fn decode(&mut self, cursor: &mut PayloadCursor<'_>) -> Result<()> {
        let len = match self.fixed_len {
            Some(n) => n as usize,
            None => cursor.read_array_len()?,
        };
        if len > MAX_ARRAY_LEN {
            return Err(BagError::corrupt(
                cursor.position() as u64,
                format!("array length {len} exceeds maximum of {MAX_ARRAY_LEN}"),
            ));
        }

        self.storage = match &self.element {
            ArrayElement::Primitive(kind) => match kind.wire_size() {
                // Fixed-width elements are read in one bulk copy and
                // decoded lazily by the typed accessors.
                Some(width) => {
                    let bytes = cursor.read_bytes(len * width)?;
                    ArrayStorage::Packed(bytes.to_vec())
                }
                // Strings are variable length; decode them now.
                None => {
                    let mut strings = Vec::with_capacity(len.min(1024));
                    for _ in 0..len {
                        strings.push(cursor.read_string()?);
                    }
                    ArrayStorage::Strings(strings)
                }
            },
            ArrayElement::Message(proto) => {
                let mut messages = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let mut instance = (**proto).clone();
                    instance.decode_from(cursor)?;
                    messages.push(instance);
                }
                ArrayStorage::Messages(messages)
            }
        };
        self.decoded = true;
        Ok(())
    }

    /// Number of elements decoded.
    pub fn len(&self) -> usize {
        match &self.storage {
            ArrayStorage::Empty => 0,
            ArrayStorage::Packed(raw) => {
                self.element_wire_size().map_or(0, |w| raw.len() / w)
            }
            ArrayStorage::Strings(s) => s.len(),
            ArrayStorage::Messages(m) => m.len(),
        }
    }

    /// Whether the array decoded zero elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw little-endian bytes of a packed primitive array.
    pub fn raw(&self) -> Result<&[u8]> {
        if !self.decoded {
            return Err(BagError::uninitialized("array"));
        }
        match &self.storage {
            ArrayStorage::Packed(raw) => Ok(raw),
            _ => Err(BagError::uninitialized("array")),
        }
    }

    /// Elements as `u8`. Appropriate for `uint8` and `char` arrays.
    pub fn as_u8(&self) -> Result<Vec<u8>> {
        Ok(self.raw()?.to_vec())
    }

    /// Elements as `i8`. Appropriate for `int8` and `byte` arrays.
    pub fn as_i8(&self) -> Result<Vec<i8>> {
        Ok(self.raw()?.iter().map(|&b| b as i8).collect())
    }

    /// Elements as `bool`. Appropriate for `bool` arrays.
    pub fn as_bool(&self) -> Result<Vec<bool>> {
        Ok(self.raw()?.iter().map(|&b| b != 0).collect())
    }

    /// Elements as `i16`. Appropriate for `int16` arrays.
    pub fn as_i16(&self) -> Result<Vec<i16>> {
        Ok(self
            .raw()?
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Elements as `u16`. Appropriate for `uint16` arrays.
    pub fn as_u16(&self) -> Result<Vec<u16>> {
        Ok(self
            .raw()?
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Elements as `i32`. Appropriate for `int32` arrays.
    pub fn as_i32(&self) -> Result<Vec<i32>> {
        Ok(self
            .raw()?
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Elements as `u32`. Appropriate for `uint32` arrays.
    pub fn as_u32(&self) -> Result<Vec<u32>> {
        Ok(self
            .raw()?
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Elements as `i64`. Appropriate for `int64` arrays.
    pub fn as_i64(&self) -> Result<Vec<i64>> {
        Ok(self
            .raw()?
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// Elements as `u64`. Appropriate for `uint64` arrays; the full
    /// unsigned range is representable.
    pub fn as_u64(&self) -> Result<Vec<u64>> {
        Ok(self
            .raw()?
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// Elements as `f32`. Appropriate for `float32` arrays.
    pub fn as_f32(&self) -> Result<Vec<f32>> {
        Ok(self
            .raw()?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Elements as `f64`. Appropriate for `float64` arrays.
    pub fn as_f64(&self) -> Result<Vec<f64>> {
        Ok(self
            .raw()?
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// Elements as timestamps. Appropriate for `time` arrays.
    pub fn as_times(&self) -> Result<Vec<BagTime>> {
        Ok(self
            .raw()?
            .chunks_exact(8)
            .map(|c| {
                BagTime::new(
                    u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })
            .collect())
    }

    /// Elements as seconds. Appropriate for `duration` arrays.
    pub fn as_durations(&self) -> Result<Vec<f64>> {
        Ok(self
            .raw()?
            .chunks_exact(8)
            .map(|c| {
                BagDuration::new(
                    i32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    i32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
                .as_secs_f64()
            })
            .collect())
    }

    /// String elements, for `string` arrays.
    pub fn strings(&self) -> Result<&[String]> {
        if !self.decoded {
            return Err(BagError::uninitialized("array"));
        }
        match &self.storage {
            ArrayStorage::Strings(s) => Ok(s),
            _ => Err(BagError::uninitialized("array")),
        }
    }

    /// Decoded message elements, for arrays of nested messages.
    pub fn messages(&self) -> Result<&[MessageDecoder]> {
        if !self.decoded {
            return Err(BagError::uninitialized("array"));
        }
        match &self.storage {
            ArrayStorage::Messages(m) => Ok(m),
            _ => Err(BagError::uninitialized("array")),
        }
    }
}

/// Build a decoder for a registry's top-level type.
pub fn build_for_top_type(
    registry: &crate::schema::registry::SchemaRegistry,
) -> Result<MessageDecoder> {
    let schema: Arc<Schema> = registry.top()?;
    Ok(MessageDecoder::from_schema(&schema))
}
