// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Base-32 ASCII formatting: converting between a bit sequence (whose
//! length must be a multiple of 5) and a grouped, human-transcribable
//! string.

use once_cell::sync::Lazy;

use crate::{
    bitio::{pack_msb, Bits},
    error::{Result, TicketError},
};

/// `0-9 a-h j-k m-n p-y`: 32 symbols, excluding the visually ambiguous
/// `i`, `l`, `o` and the pad-reserved `z`.
const ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstuvwxy";
const PAD_CHAR: u8 = b'z';

static DECODE_TABLE: Lazy<[Option<u8>; 128]> = Lazy::new(|| {
    let mut table = [None; 128];
    for (value, &ch) in ALPHABET.iter().enumerate() {
        table[ch as usize] = Some(value as u8);
        table[ch.to_ascii_uppercase() as usize] = Some(value as u8);
    }
    table
});

/// Immutable presentation rules for the ticket string surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketFormat {
    pub upper_case: bool,
    pub group_length: usize,
    pub separator_char: char,
    pub pad_groups: bool,
}

/// `lowercase, '-'-separated groups of 5, padded with 'z'` — the
/// process-wide immutable default.
pub static DEFAULT_FORMAT: Lazy<TicketFormat> = Lazy::new(|| {
    TicketFormat::new(false, 5, '-', true).expect("DEFAULT_FORMAT is well-formed")
});

impl TicketFormat {
    pub fn new(upper_case: bool, group_length: usize, separator_char: char, pad_groups: bool) -> Result<Self> {
        if !separator_char.is_ascii() || !is_printable_ascii(separator_char as u32) {
            return Err(TicketError::InvalidArgument(
                "separator_char must be printable ASCII".into(),
            ));
        }
        if separator_char.is_ascii_digit() {
            return Err(TicketError::InvalidArgument(
                "separator_char must not be a digit".into(),
            ));
        }
        Ok(Self { upper_case, group_length, separator_char, pad_groups })
    }

    fn separator(&self) -> char {
        if self.upper_case {
            self.separator_char.to_ascii_uppercase()
        } else {
            self.separator_char.to_ascii_lowercase()
        }
    }

    /// Encodes `bits` (length must be a multiple of 5) as grouped
    /// ASCII, failing `TooLong` if the result exceeds `max_len`.
    pub fn encode(&self, bits: &Bits, max_len: usize) -> Result<String> {
        debug_assert_eq!(bits.len() % 5, 0, "bit image must be pre-padded to a multiple of 5");
        let n = bits.len() / 5;
        let bytes = pack_msb(bits);

        let mut symbols = Vec::with_capacity(n);
        for i in 0..n {
            let bit_offset = i * 5;
            let value = read_5_bits(&bytes, bit_offset);
            let ch = ALPHABET[value as usize] as char;
            symbols.push(if self.upper_case { ch.to_ascii_uppercase() } else { ch });
        }

        let out = if self.group_length == 0 {
            symbols.into_iter().collect::<String>()
        } else {
            let sep = self.separator();
            let pad_char = if self.upper_case {
                PAD_CHAR.to_ascii_uppercase() as char
            } else {
                PAD_CHAR as char
            };
            let mut s = String::with_capacity(n + n / self.group_length.max(1));
            for (i, chunk) in symbols.chunks(self.group_length).enumerate() {
                if i > 0 {
                    s.push(sep);
                }
                s.extend(chunk.iter());
                if self.pad_groups && chunk.len() < self.group_length {
                    for _ in chunk.len()..self.group_length {
                        s.push(pad_char);
                    }
                }
            }
            s
        };

        if out.chars().count() > max_len {
            return Err(TicketError::TooLong { limit: max_len, actual: out.chars().count() });
        }
        Ok(out)
    }

    /// Decodes `s` back into its bit sequence. Any printable ASCII
    /// character outside the 32-symbol alphabet (including the pad
    /// character) is treated as a group separator and dropped.
    pub fn decode(&self, s: &str, max_len: usize) -> Result<Bits> {
        if s.chars().count() > max_len {
            return Err(TicketError::TooLong { limit: max_len, actual: s.chars().count() });
        }
        if s.is_empty() {
            return Err(TicketError::InvalidArgument("ticket string is empty".into()));
        }

        let mut values = Vec::with_capacity(s.len());
        for (offset, ch) in s.char_indices() {
            if !ch.is_ascii() || !is_printable_ascii(ch as u32) {
                return Err(TicketError::InvalidChar(offset));
            }
            if let Some(value) = DECODE_TABLE[ch as usize] {
                values.push(value);
            }
            // else: printable separator (including the pad char), skip.
        }

        let mut bits = Bits::with_capacity(values.len() * 5);
        for value in values {
            for i in (0..5).rev() {
                bits.push((value >> i) & 1 == 1);
            }
        }
        Ok(bits)
    }
}

fn read_5_bits(bytes: &[u8], bit_offset: usize) -> u8 {
    let mut value = 0u8;
    for i in 0..5 {
        let bit_index = bit_offset + i;
        let byte = bytes.get(bit_index / 8).copied().unwrap_or(0);
        let bit = (byte >> (7 - (bit_index % 8))) & 1;
        value = (value << 1) | bit;
    }
    value
}

fn is_printable_ascii(c: u32) -> bool {
    (0x20..0x7f).contains(&c)
}
