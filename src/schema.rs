// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Field schemas and the adapter that serializes/deserializes a
//! caller-declared record shape to and from the bit-stream.
//!
//! Rather than deriving field layouts by reflecting over a
//! language-native record type, a [`FieldSchema`] is an explicit,
//! caller-built value — a sum-typed list of `{index, kind, secret}`
//! entries — and a record is just the ordered [`FieldValue`] tuple
//! indexed positionally by `Field::index`.

use serde::{Deserialize, Serialize};

use crate::{
    bitio::{BitReader, BitWriter},
    error::{Result, TicketError},
};

/// The primitive (and compound) kinds a field may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    /// Char-equivalent: a 16-bit code point, coded as a `positive_int`.
    U16,
    F32,
    F64,
    Str,
    /// A closed set of symbols; the domain must be non-empty.
    Enum(Vec<String>),
    /// An array of a primitive or enum element kind (never `Str` or
    /// another `Array`).
    Array(Box<FieldKind>),
}

impl FieldKind {
    fn is_valid_array_element(&self) -> bool {
        !matches!(self, FieldKind::Str | FieldKind::Array(_))
    }
}

/// One declared field: its position in the record tuple, its kind, and
/// whether it belongs in the encrypted secret block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub index: usize,
    pub kind: FieldKind,
    pub is_secret: bool,
}

impl Field {
    pub fn new(index: usize, kind: FieldKind, is_secret: bool) -> Self {
        Self { index, kind, is_secret }
    }
}

/// The caller-visible value of one field, keyed positionally by
/// `Field::index`. A `Record` is simply `Vec<FieldValue>` — see the
/// module docs for why there's no reflective record type here.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U16(u16),
    F32(f32),
    F64(f64),
    Str(String),
    Enum(String),
    Array(Vec<FieldValue>),
}

/// A record is an ordered tuple of field values, one per declared
/// index.
pub type Record = Vec<FieldValue>;

/// An ordered, validated list of fields describing one record shape.
///
/// Serialized as a plain `Vec<Field>`; deserializing routes through
/// [`FieldSchema::new`] so a malformed config file (duplicate index,
/// empty enum domain, ...) fails config loading instead of silently
/// producing an unvalidated schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct FieldSchema {
    fields: Vec<Field>,
}

impl TryFrom<Vec<Field>> for FieldSchema {
    type Error = TicketError;

    fn try_from(fields: Vec<Field>) -> Result<Self> {
        FieldSchema::new(fields)
    }
}

impl From<FieldSchema> for Vec<Field> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}

impl FieldSchema {
    /// The zero-field schema used for `origin = ()` / `data = ()`.
    pub fn unit() -> Self {
        Self { fields: Vec::new() }
    }

    /// Validates and sorts the given fields by declared index.
    ///
    /// Rejects missing/duplicate/non-dense indices, empty enum
    /// domains, and array element kinds that aren't primitive or enum,
    /// all via the schema-construction `InvalidArgument` path.
    pub fn new(mut fields: Vec<Field>) -> Result<Self> {
        fields.sort_by_key(|f| f.index);
        for (i, f) in fields.iter().enumerate() {
            if f.index != i {
                return Err(TicketError::InvalidArgument(format!(
                    "field indices must be dense starting at 0 (got {} at position {i})",
                    f.index
                )));
            }
            match &f.kind {
                FieldKind::Enum(domain) if domain.is_empty() => {
                    return Err(TicketError::InvalidArgument(format!(
                        "field {i}: enum domain must be non-empty"
                    )));
                },
                FieldKind::Array(elem) if !elem.is_valid_array_element() => {
                    return Err(TicketError::InvalidArgument(format!(
                        "field {i}: array element kind must be primitive or enum"
                    )));
                },
                _ => {},
            }
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn open_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| !f.is_secret).collect()
    }

    pub fn secret_fields(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.is_secret).collect()
    }

    pub fn has_secret_fields(&self) -> bool {
        self.fields.iter().any(|f| f.is_secret)
    }

    /// Kind-specific zero values: numeric zero, empty string, empty
    /// array, first enum symbol, `false`.
    pub fn default_value(kind: &FieldKind) -> FieldValue {
        match kind {
            FieldKind::Bool => FieldValue::Bool(false),
            FieldKind::I8 => FieldValue::I8(0),
            FieldKind::I16 => FieldValue::I16(0),
            FieldKind::I32 => FieldValue::I32(0),
            FieldKind::I64 => FieldValue::I64(0),
            FieldKind::U16 => FieldValue::U16(0),
            FieldKind::F32 => FieldValue::F32(0.0),
            FieldKind::F64 => FieldValue::F64(0.0),
            FieldKind::Str => FieldValue::Str(String::new()),
            FieldKind::Enum(domain) => {
                FieldValue::Enum(domain.first().cloned().unwrap_or_default())
            },
            FieldKind::Array(_) => FieldValue::Array(Vec::new()),
        }
    }

    /// A full-width vector of kind-specific defaults, one per declared
    /// field, ready to be partially overwritten by [`FieldAdapter::read`].
    pub fn default_record(&self) -> Record {
        self.fields.iter().map(|f| Self::default_value(&f.kind)).collect()
    }
}

/// Serializes/deserializes a [`Record`] against a [`FieldSchema`],
/// split by the open/secret partition.
pub struct FieldAdapter<'a> {
    schema: &'a FieldSchema,
}

impl<'a> FieldAdapter<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }

    /// Emits `positive_int(len(F))` followed by each field's value in
    /// declared order, where `F` is the open or secret partition.
    /// Returns the number of bits written.
    pub fn write(&self, writer: &mut BitWriter, secret: bool, values: &[FieldValue]) -> Result<usize> {
        let start = writer.position();
        let group = if secret { self.schema.secret_fields() } else { self.schema.open_fields() };
        writer.write_positive_int(group.len() as u32);
        for field in group {
            let value = values.get(field.index).ok_or_else(|| {
                TicketError::InvalidArgument(format!("missing value for field {}", field.index))
            })?;
            encode_value(writer, &field.kind, value)?;
        }
        Ok(writer.position() - start)
    }

    /// Reads `count = positive_int`, then decodes `count` fields from
    /// the corresponding partition into `values`, leaving any
    /// remaining slots at their prior (default) value.
    pub fn read(&self, reader: &mut BitReader<'_>, secret: bool, values: &mut [FieldValue]) -> Result<()> {
        let group = if secret { self.schema.secret_fields() } else { self.schema.open_fields() };
        let count = reader.read_positive_int()? as usize;
        if count == 0 && group.is_empty() {
            return Ok(());
        }
        if count > group.len() {
            return Err(TicketError::Malformed(format!(
                "field count {count} exceeds schema's {} fields",
                group.len()
            )));
        }
        for field in group.into_iter().take(count) {
            let value = decode_value(reader, &field.kind)?;
            if let Some(slot) = values.get_mut(field.index) {
                *slot = value;
            }
        }
        Ok(())
    }

    /// Projects a flat values tuple into the caller-visible record.
    /// This is a thin projection (a clone of the tuple), not a deep
    /// copy through any reflective accessor layer.
    pub fn adapt(&self, values: &[FieldValue]) -> Record {
        values.to_vec()
    }

    /// Extracts values in declared-index order; `None` yields the
    /// schema's defaults (the "null record" case).
    pub fn unadapt(&self, record: Option<&Record>) -> Record {
        match record {
            Some(r) => r.clone(),
            None => self.schema.default_record(),
        }
    }
}

fn encode_value(writer: &mut BitWriter, kind: &FieldKind, value: &FieldValue) -> Result<()> {
    match (kind, value) {
        (FieldKind::Bool, FieldValue::Bool(b)) => writer.write_boolean(*b),
        (FieldKind::I8, FieldValue::I8(v)) => writer.write_int(*v as i32),
        (FieldKind::I16, FieldValue::I16(v)) => writer.write_int(*v as i32),
        (FieldKind::I32, FieldValue::I32(v)) => writer.write_int(*v),
        (FieldKind::I64, FieldValue::I64(v)) => writer.write_long(*v),
        (FieldKind::U16, FieldValue::U16(v)) => writer.write_positive_int(*v as u32),
        (FieldKind::F32, FieldValue::F32(v)) => writer.write_float(*v),
        (FieldKind::F64, FieldValue::F64(v)) => writer.write_double(*v),
        (FieldKind::Str, FieldValue::Str(s)) => writer.write_string(s),
        (FieldKind::Enum(domain), FieldValue::Enum(sym)) => {
            let ordinal = domain.iter().position(|s| s == sym).ok_or_else(|| {
                TicketError::InvalidArgument(format!("{sym:?} is not in the enum domain"))
            })?;
            writer.write_positive_int(ordinal as u32);
        },
        (FieldKind::Array(elem_kind), FieldValue::Array(items)) => {
            writer.write_positive_int(items.len() as u32);
            for item in items {
                encode_value(writer, elem_kind, item)?;
            }
        },
        (kind, value) => {
            return Err(TicketError::InvalidArgument(format!(
                "value {value:?} does not match field kind {kind:?}"
            )));
        },
    }
    Ok(())
}

fn decode_value(reader: &mut BitReader<'_>, kind: &FieldKind) -> Result<FieldValue> {
    Ok(match kind {
        FieldKind::Bool => FieldValue::Bool(reader.read_boolean()?),
        FieldKind::I8 => FieldValue::I8(reader.read_int()? as i8),
        FieldKind::I16 => FieldValue::I16(reader.read_int()? as i16),
        FieldKind::I32 => FieldValue::I32(reader.read_int()?),
        FieldKind::I64 => FieldValue::I64(reader.read_long()?),
        FieldKind::U16 => FieldValue::U16(reader.read_positive_int()? as u16),
        FieldKind::F32 => FieldValue::F32(reader.read_float()?),
        FieldKind::F64 => FieldValue::F64(reader.read_double()?),
        FieldKind::Str => FieldValue::Str(reader.read_string()?),
        FieldKind::Enum(domain) => {
            let ordinal = reader.read_positive_int()? as usize;
            let sym = domain.get(ordinal).ok_or_else(|| {
                TicketError::Malformed(format!("enum ordinal {ordinal} out of range"))
            })?;
            FieldValue::Enum(sym.clone())
        },
        FieldKind::Array(elem_kind) => {
            let len = reader.read_positive_int()? as usize;
            let mut items = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                items.push(decode_value(reader, elem_kind)?);
            }
            FieldValue::Array(items)
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::{BitReader, BitWriter};

    fn sample_schema() -> FieldSchema {
        FieldSchema::new(vec![
            Field::new(0, FieldKind::Str, false),
            Field::new(1, FieldKind::I64, true),
            Field::new(2, FieldKind::Enum(vec!["a".into(), "b".into()]), false),
        ])
        .expect("valid schema")
    }

    #[test]
    fn rejects_non_dense_indices() {
        let err = FieldSchema::new(vec![Field::new(1, FieldKind::Bool, false)]).unwrap_err();
        assert!(matches!(err, TicketError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_empty_enum_domain() {
        let err =
            FieldSchema::new(vec![Field::new(0, FieldKind::Enum(vec![]), false)]).unwrap_err();
        assert!(matches!(err, TicketError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_array_of_array() {
        let err = FieldSchema::new(vec![Field::new(
            0,
            FieldKind::Array(Box::new(FieldKind::Array(Box::new(FieldKind::Bool)))),
            false,
        )])
        .unwrap_err();
        assert!(matches!(err, TicketError::InvalidArgument(_)));
    }

    #[test]
    fn open_secret_partition_roundtrip() {
        let schema = sample_schema();
        let adapter = FieldAdapter::new(&schema);
        let values: Record = vec![
            FieldValue::Str("hello".into()),
            FieldValue::I64(-42),
            FieldValue::Enum("b".into()),
        ];

        let mut w = BitWriter::new();
        adapter.write(&mut w, false, &values).expect("write open");
        adapter.write(&mut w, true, &values).expect("write secret");
        let bits = w.into_bits();

        let mut r = BitReader::new(&bits);
        let mut decoded = schema.default_record();
        adapter.read(&mut r, false, &mut decoded).expect("read open");
        adapter.read(&mut r, true, &mut decoded).expect("read secret");
        assert_eq!(decoded, values);
    }

    #[test]
    fn omitted_field_decodes_to_default() {
        let schema = FieldSchema::new(vec![
            Field::new(0, FieldKind::I32, false),
            Field::new(1, FieldKind::Str, false),
        ])
        .expect("valid schema");
        let adapter = FieldAdapter::new(&schema);

        let mut w = BitWriter::new();
        // Manually emit count=1, only field 0.
        w.write_positive_int(1);
        w.write_int(7);
        let bits = w.into_bits();

        let mut r = BitReader::new(&bits);
        let mut decoded = schema.default_record();
        adapter.read(&mut r, false, &mut decoded).expect("read");
        assert_eq!(decoded[0], FieldValue::I32(7));
        assert_eq!(decoded[1], FieldValue::Str(String::new()));
    }

    #[test]
    fn count_exceeding_schema_is_malformed() {
        let schema = FieldSchema::new(vec![Field::new(0, FieldKind::Bool, false)]).unwrap();
        let adapter = FieldAdapter::new(&schema);
        let mut w = BitWriter::new();
        w.write_positive_int(5);
        let bits = w.into_bits();
        let mut r = BitReader::new(&bits);
        let mut decoded = schema.default_record();
        let err = adapter.read(&mut r, false, &mut decoded).unwrap_err();
        assert!(matches!(err, TicketError::Malformed(_)));
    }
}
