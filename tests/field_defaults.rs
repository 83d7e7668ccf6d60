// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A field omitted from a decoded ticket (count < schema length)
//! decodes to its kind-specific default, exercised here through the
//! bit-level adapter rather than the factory (the factory's own
//! `write` always emits every field).

use ticketforge::{
    bitio::{BitReader, BitWriter},
    schema::{Field, FieldAdapter, FieldKind, FieldSchema, FieldValue},
};

#[test]
fn an_omitted_trailing_field_decodes_to_its_kind_default() {
    let schema = FieldSchema::new(vec![
        Field::new(0, FieldKind::Bool, false),
        Field::new(1, FieldKind::Str, false),
        Field::new(2, FieldKind::Enum(vec!["red".into(), "green".into()]), false),
        Field::new(3, FieldKind::Array(Box::new(FieldKind::I32)), false),
    ])
    .expect("schema");
    let adapter = FieldAdapter::new(&schema);

    // Only the first two fields were present when this was written.
    let mut w = BitWriter::new();
    w.write_positive_int(2);
    w.write_boolean(true);
    w.write_string("hi");
    let bits = w.into_bits();

    let mut r = BitReader::new(&bits);
    let mut values = schema.default_record();
    adapter.read(&mut r, false, &mut values).expect("read");

    assert_eq!(values[0], FieldValue::Bool(true));
    assert_eq!(values[1], FieldValue::Str("hi".into()));
    assert_eq!(values[2], FieldValue::Enum("red".into()));
    assert_eq!(values[3], FieldValue::Array(vec![]));
}
