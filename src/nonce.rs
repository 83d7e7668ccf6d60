// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-hiding nonce derivation.
//!
//! The nonce decouples the encoded secret-block length (`sLength`)
//! from the actual secret payload's length, so two tickets with the
//! same open state but different-sized secret payloads don't leak
//! that difference in their total bit length. Its derivation must be
//! bit-for-bit reproducible across implementations (two factories
//! sharing a key must derive the same nonce length from the same
//! digest tail), so the generator is specified here rather than
//! delegated to a general-purpose PRNG whose algorithm isn't a stable
//! contract.

const MULTIPLIER: u64 = 0x5DEECE66D;
const ADDEND: u64 = 0xB;
const MASK: u64 = (1u64 << 48) - 1;

/// The classic 48-bit linear congruential generator popularized by
/// `java.util.Random`; chosen for its widely-documented, trivially
/// reproducible bit behavior.
struct Lcg {
    seed: u64,
}

impl Lcg {
    fn seeded(seed: i64) -> Self {
        Self { seed: (seed as u64 ^ MULTIPLIER) & MASK }
    }

    fn next_bits(&mut self, bits: u32) -> u32 {
        self.seed = (self.seed.wrapping_mul(MULTIPLIER).wrapping_add(ADDEND)) & MASK;
        (self.seed >> (48 - bits)) as u32
    }

    fn next_u32(&mut self) -> u32 {
        self.next_bits(32)
    }

    fn next_i32(&mut self) -> i32 {
        self.next_bits(32) as i32
    }
}

/// Derives the nonce from a 28-byte spec digest: seeds the LCG with
/// the digest's last 8 bytes (big-endian, as a signed 64-bit seed),
/// draws a bit count in `16..=31`, then a 32-bit value whose low bits
/// become the nonce's body. The result's bit length is `count + 1`,
/// i.e. in `[17, 32]`.
pub fn derive_nonce(digest: &[u8; 28]) -> u64 {
    let seed_bytes: [u8; 8] = digest[20..28].try_into().expect("slice is exactly 8 bytes");
    let seed = i64::from_be_bytes(seed_bytes);
    let mut rng = Lcg::seeded(seed);

    let count: u32 = 16 + (rng.next_u32() % 16);
    let bits = rng.next_i32();

    let mask: u64 = (1u64 << count) - 1;
    (1u64 << count) | ((bits as u64) & mask)
}
