// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! [`Ticket`]: the immutable, decoded (or freshly issued) view of one
//! ticket.

use crate::{bitio::Bits, schema::Record};

/// One ticket, either just issued by a [`crate::machine::Machine`] or
/// reconstructed by [`crate::factory::Factory::decode`]. Two tickets
/// are equal iff they carry the same spec and the same bit image —
/// the decoded field projections are derived, not independent state.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub spec_index: usize,
    pub timestamp_ms: i64,
    pub sequence_number: u64,
    pub origin: Record,
    pub data: Record,
    pub bit_image: Bits,
    pub string_image: String,
}

impl Ticket {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec_index: usize,
        timestamp_ms: i64,
        sequence_number: u64,
        origin: Record,
        data: Record,
        bit_image: Bits,
        string_image: String,
    ) -> Self {
        Self { spec_index, timestamp_ms, sequence_number, origin, data, bit_image, string_image }
    }
}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.spec_index == other.spec_index && self.bit_image == other.bit_image
    }
}

impl Eq for Ticket {}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.string_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(spec_index: usize, bits: &[bool], s: &str) -> Ticket {
        Ticket::new(spec_index, 0, 0, vec![], vec![], bits.iter().collect(), s.into())
    }

    #[test]
    fn equality_ignores_string_image() {
        let a = ticket(0, &[true, false], "abc");
        let b = ticket(0, &[true, false], "xyz-differs");
        assert_eq!(a, b);
    }

    #[test]
    fn different_spec_indices_are_unequal() {
        let a = ticket(0, &[true, false], "abc");
        let b = ticket(1, &[true, false], "abc");
        assert_ne!(a, b);
    }

    #[test]
    fn display_renders_the_string_image() {
        let t = ticket(0, &[true], "rendered-form");
        assert_eq!(t.to_string(), "rendered-form");
    }
}
