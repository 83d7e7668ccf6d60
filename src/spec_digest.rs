// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One ticket specification (`TicketSpec`) and the per-spec pre-keyed
//! Keccak digest ring that backs both the integrity tag and the
//! secret-block one-time pad.

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Keccak224};

use crate::{
    bitio::{pack_msb, BitSlice, Bits},
    error::{Result, TicketError},
};

/// The quantization applied to `now_ms - origin_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Millisecond,
    Second,
    Minute,
    Hour,
}

impl Granularity {
    fn scale_ms(self) -> i64 {
        match self {
            Granularity::Millisecond => 1,
            Granularity::Second => 1_000,
            Granularity::Minute => 60_000,
            Granularity::Hour => 3_600_000,
        }
    }
}

/// The maximum integrity tag width; 64 bits are always reserved for
/// the length-hiding nonce.
pub const MAX_HASH_LENGTH_BITS: u32 = 224;
/// `secret_payload_bits <= 224 - 64`.
pub const MAX_SECRET_PAYLOAD_BITS: usize = (MAX_HASH_LENGTH_BITS as usize) - 64;

/// One immutable ticket format generation.
///
/// Serialized through [`RawTicketSpec`] so a config file's
/// `hash_length_bits` is validated by [`TicketSpec::new`] on
/// deserialize rather than landing in a struct that bypasses it (the
/// same `try_from`-validated wrapper [`crate::schema::FieldSchema`]
/// uses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTicketSpec", into = "RawTicketSpec")]
pub struct TicketSpec {
    pub time_zone: Tz,
    pub granularity: Granularity,
    pub origin_year: i32,
    pub hash_length_bits: u32,
}

/// The unvalidated shape deserialized straight off the wire/config
/// file, before [`TicketSpec::new`] checks `hash_length_bits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTicketSpec {
    pub time_zone: Tz,
    pub granularity: Granularity,
    pub origin_year: i32,
    pub hash_length_bits: u32,
}

impl TryFrom<RawTicketSpec> for TicketSpec {
    type Error = TicketError;

    fn try_from(raw: RawTicketSpec) -> Result<Self> {
        TicketSpec::new(raw.time_zone, raw.granularity, raw.origin_year, raw.hash_length_bits)
    }
}

impl From<TicketSpec> for RawTicketSpec {
    fn from(spec: TicketSpec) -> Self {
        Self {
            time_zone: spec.time_zone,
            granularity: spec.granularity,
            origin_year: spec.origin_year,
            hash_length_bits: spec.hash_length_bits,
        }
    }
}

impl TicketSpec {
    pub fn new(time_zone: Tz, granularity: Granularity, origin_year: i32, hash_length_bits: u32) -> Result<Self> {
        if hash_length_bits > MAX_HASH_LENGTH_BITS {
            return Err(TicketError::InvalidArgument(format!(
                "hash_length_bits must be <= {MAX_HASH_LENGTH_BITS} (got {hash_length_bits})"
            )));
        }
        Ok(Self { time_zone, granularity, origin_year, hash_length_bits })
    }

    /// UTC milliseconds at midnight of `origin_year`-01-01 in
    /// `time_zone`.
    pub fn origin_ms(&self) -> i64 {
        let local_midnight = self
            .time_zone
            .with_ymd_and_hms(self.origin_year, 1, 1, 0, 0, 0)
            .single()
            .expect("Jan 1st midnight is unambiguous in every IANA zone");
        local_midnight.with_timezone(&Utc).timestamp_millis()
    }

    /// Converts an absolute epoch-ms timestamp to this spec's
    /// quantized, origin-relative timestamp.
    pub fn to_spec_timestamp(&self, now_ms: i64) -> i64 {
        (now_ms - self.origin_ms()) / self.granularity.scale_ms()
    }

    /// The inverse of [`TicketSpec::to_spec_timestamp`], used to
    /// reconstruct `Ticket::timestamp_ms` on decode.
    pub fn to_absolute_ms(&self, spec_timestamp: i64) -> i64 {
        self.origin_ms() + spec_timestamp * self.granularity.scale_ms()
    }
}

/// The pre-keyed Keccak-224 sponge for every spec in a factory's list,
/// built once at construction time and never mutated afterward — every
/// [`DigestRing::digest`] call clones before updating.
#[derive(Clone)]
pub struct DigestRing {
    prekeyed: Vec<Keccak224>,
}

impl DigestRing {
    /// `num_specs` pre-keyed states, one per spec. `secrets[i]` (if
    /// present and non-empty) is mixed into a fresh sponge for spec
    /// `i`; specs beyond `secrets.len()` inherit the last configured
    /// secret's sponge.
    pub fn new(num_specs: usize, secrets: &[Vec<u8>]) -> Self {
        let base = Keccak224::new();
        let mut prekeyed: Vec<Keccak224> = Vec::with_capacity(num_specs);
        for i in 0..num_specs {
            let d = if i < secrets.len() {
                if secrets[i].is_empty() {
                    base.clone()
                } else {
                    tracing::debug!(spec_index = i, "pre-keying ticket spec digest with a secret");
                    let mut d = base.clone();
                    d.update(&secrets[i]);
                    d
                }
            } else if let Some(last) = secrets.len().checked_sub(1).map(|idx| prekeyed[idx].clone()) {
                last
            } else {
                base.clone()
            };
            prekeyed.push(d);
        }
        Self { prekeyed }
    }

    /// `digest(i, bytes)`: clone-then-update-then-finalize against
    /// spec `i`'s prekey.
    pub fn digest(&self, spec_index: usize, bytes: &[u8]) -> [u8; 28] {
        let mut d = self.prekeyed[spec_index].clone();
        d.update(bytes);
        let out = d.finalize();
        let mut buf = [0u8; 28];
        buf.copy_from_slice(&out);
        buf
    }

    /// `hash_tag(spec_i, bits)`: the leading `hash_length_bits` of the
    /// digest over `bits`, or empty if the spec disables tagging.
    pub fn hash_tag(&self, spec_index: usize, hash_length_bits: u32, bits: &BitSlice) -> Bits {
        if hash_length_bits == 0 {
            return Bits::new();
        }
        let bytes = pack_msb(bits);
        let digest = self.digest(spec_index, &bytes);
        bits_from_bytes(&digest)[..hash_length_bits as usize].to_bitvec()
    }
}

/// Views a byte slice as an MSB-first bit sequence.
pub fn bits_from_bytes(bytes: &[u8]) -> Bits {
    use bitvec::prelude::*;
    BitVec::<u8, Msb0>::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(hash_bits: u32) -> TicketSpec {
        TicketSpec::new(chrono_tz::UTC, Granularity::Second, 2000, hash_bits).expect("valid spec")
    }

    #[test]
    fn rejects_hash_length_over_224() {
        assert!(TicketSpec::new(chrono_tz::UTC, Granularity::Second, 2000, 225).is_err());
    }

    #[test]
    fn deserializing_an_out_of_range_hash_length_fails_instead_of_building_a_bad_spec() {
        let yaml = "\
time_zone: UTC
granularity: Second
origin_year: 2000
hash_length_bits: 300
";
        let err = serde_yaml::from_str::<TicketSpec>(yaml).unwrap_err();
        assert!(err.to_string().contains("hash_length_bits"));
    }

    #[test]
    fn origin_ms_is_midnight_2000_utc() {
        let s = spec(0);
        assert_eq!(s.origin_ms(), 946_684_800_000);
    }

    #[test]
    fn spec_timestamp_roundtrip() {
        let s = spec(0);
        let now = s.origin_ms() + 12_345_000;
        let ts = s.to_spec_timestamp(now);
        assert_eq!(s.to_absolute_ms(ts), now);
    }

    #[test]
    fn digest_ring_keys_prekeyed_states_independently() {
        let ring = DigestRing::new(2, &[b"alpha".to_vec(), b"beta".to_vec()]);
        let a = ring.digest(0, b"payload");
        let b = ring.digest(1, b"payload");
        assert_ne!(a, b);
    }

    #[test]
    fn unspecified_secrets_inherit_the_last_configured_one() {
        let ring = DigestRing::new(3, &[b"only-one".to_vec()]);
        let a = ring.digest(1, b"payload");
        let b = ring.digest(2, b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn zero_hash_length_yields_empty_tag() {
        let ring = DigestRing::new(1, &[]);
        let bits = bits_from_bytes(&[0xAB]);
        let tag = ring.hash_tag(0, 0, &bits);
        assert!(tag.is_empty());
    }
}
