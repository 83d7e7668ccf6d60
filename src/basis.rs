// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `TicketBasis`: the immutable identity `(spec_index, origin)` under
//! which a [`crate::machine::Machine`] issues tickets. It is both the
//! cache key for the factory's machines map and the key under which a
//! [`crate::sequence::SequenceProvider`] tracks per-origin counters.

use std::hash::{Hash, Hasher};

use crate::{
    bitio::{pack_msb, BitWriter, Bits},
    schema::Record,
    spec_digest::DigestRing,
};

/// `(spec_index, open_origin_bits, secret_origin_bits)` plus the
/// caller-visible projections kept around for convenience. Equality
/// and hashing only ever consider the three identity fields.
#[derive(Debug, Clone)]
pub struct TicketBasis {
    pub spec_index: usize,
    pub open_origin_bits: Bits,
    pub secret_origin_bits: Bits,
    pub origin_record: Record,
    pub raw_values: Record,
}

impl TicketBasis {
    pub fn new(
        spec_index: usize,
        open_origin_bits: Bits,
        secret_origin_bits: Bits,
        origin_record: Record,
        raw_values: Record,
    ) -> Self {
        Self { spec_index, open_origin_bits, secret_origin_bits, origin_record, raw_values }
    }

    /// Canonical textual identifier: hex of `open_origin_bits`
    /// followed by `'0'` and `spec_index + 1` when there are no secret
    /// origin fields; otherwise the hex of a keyed Keccak digest over
    /// `open || secret || spec_index_u32_be`, so the identifier never
    /// leaks secret origin bits in the clear.
    pub fn canonical_id(&self, digests: &DigestRing) -> String {
        if self.secret_origin_bits.is_empty() {
            let bytes = pack_msb(&self.open_origin_bits);
            format!("{}0{}", hex::encode(bytes), self.spec_index + 1)
        } else {
            let mut w = BitWriter::new();
            w.write_raw_bits(&self.open_origin_bits);
            w.write_raw_bits(&self.secret_origin_bits);
            w.write_bits(self.spec_index as u64, 32);
            let bytes = w.to_bytes();
            let digest = digests.digest(self.spec_index, &bytes);
            hex::encode(digest)
        }
    }
}

impl PartialEq for TicketBasis {
    fn eq(&self, other: &Self) -> bool {
        self.spec_index == other.spec_index
            && self.open_origin_bits == other.open_origin_bits
            && self.secret_origin_bits == other.secret_origin_bits
    }
}

impl Eq for TicketBasis {}

impl Hash for TicketBasis {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spec_index.hash(state);
        self.open_origin_bits.hash(state);
        self.secret_origin_bits.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitWriter;

    fn bits(byte: u8) -> Bits {
        let mut w = BitWriter::new();
        w.write_bits(byte as u64, 8);
        w.into_bits()
    }

    #[test]
    fn equality_ignores_projections() {
        let a = TicketBasis::new(0, bits(1), Bits::new(), vec![], vec![]);
        let mut b = a.clone();
        b.origin_record = vec![crate::schema::FieldValue::Bool(true)];
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_open_bits_are_distinct_bases() {
        let a = TicketBasis::new(0, bits(1), Bits::new(), vec![], vec![]);
        let b = TicketBasis::new(0, bits(2), Bits::new(), vec![], vec![]);
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_id_without_secret_is_hex_plus_spec_marker() {
        let basis = TicketBasis::new(2, bits(0xAB), Bits::new(), vec![], vec![]);
        let digests = DigestRing::new(3, &[]);
        assert_eq!(basis.canonical_id(&digests), "ab03");
    }

    #[test]
    fn canonical_id_with_secret_hides_secret_bits() {
        let digests = DigestRing::new(1, &[b"k".to_vec()]);
        let basis = TicketBasis::new(0, bits(1), bits(2), vec![], vec![]);
        let id = basis.canonical_id(&digests);
        assert_eq!(id.len(), 56); // 28 bytes, hex-encoded
    }
}
