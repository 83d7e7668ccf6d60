// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! [`Factory`]: the public entry point. Owns a [`TicketConfig`], the
//! pre-keyed [`DigestRing`], a cache of [`Machine`]s keyed by
//! [`TicketBasis`], and the mutable presentation [`TicketFormat`].

use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::{
    basis::TicketBasis,
    bitio::{pack_msb, xor_bits, BitReader, BitWriter},
    clock::{Clock, SystemClock},
    config::TicketConfig,
    error::{Result, TicketError},
    format::{TicketFormat, DEFAULT_FORMAT},
    machine::Machine,
    schema::{FieldAdapter, FieldValue},
    sequence::{DefaultSequenceProvider, SequenceProvider},
    spec_digest::{bits_from_bytes, DigestRing, TicketSpec, MAX_SECRET_PAYLOAD_BITS},
    ticket::Ticket,
};

/// Issues and decodes tickets for one [`TicketConfig`]. Thread-safe:
/// every mutable piece of state (the machines cache, the sequence
/// provider's per-basis counters, the presentation format) is behind
/// either a concurrent map or an `RwLock`.
pub struct Factory {
    config: TicketConfig,
    specs: Vec<Arc<TicketSpec>>,
    origin_schema: Arc<crate::schema::FieldSchema>,
    data_schema: Arc<crate::schema::FieldSchema>,
    digests: Arc<DigestRing>,
    sequence_provider: Arc<dyn SequenceProvider>,
    clock: Arc<dyn Clock>,
    format: RwLock<Arc<TicketFormat>>,
    machines: DashMap<TicketBasis, Arc<Machine>>,
}

impl Factory {
    /// Builds a factory with the default in-memory sequence provider
    /// and the system clock. `secrets[i]` pre-keys spec `i`'s digest
    /// sponge; see [`DigestRing::new`] for how a short `secrets` list
    /// carries over to later specs.
    pub fn new(config: TicketConfig, secrets: Vec<Vec<u8>>) -> Self {
        Self::with_components(
            config,
            secrets,
            Arc::new(DefaultSequenceProvider::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_components(
        config: TicketConfig,
        secrets: Vec<Vec<u8>>,
        sequence_provider: Arc<dyn SequenceProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let digests = Arc::new(DigestRing::new(config.specs.len(), &secrets));
        let specs = config.specs.iter().cloned().map(Arc::new).collect();
        let origin_schema = Arc::new(config.origin_schema.clone());
        let data_schema = Arc::new(config.data_schema.clone());
        Self {
            config,
            specs,
            origin_schema,
            data_schema,
            digests,
            sequence_provider,
            clock,
            format: RwLock::new(Arc::new(DEFAULT_FORMAT.clone())),
            machines: DashMap::new(),
        }
    }

    pub fn format(&self) -> Arc<TicketFormat> {
        self.format.read().expect("format lock poisoned").clone()
    }

    pub fn set_format(&self, format: TicketFormat) {
        *self.format.write().expect("format lock poisoned") = Arc::new(format);
    }

    pub fn primary_index(&self) -> usize {
        self.config.primary_index()
    }

    /// Looks up (or builds) the machine for `origin_values` under the
    /// primary spec, sweeping out any idle machines it encounters
    /// along the way so the cache doesn't grow without bound across a
    /// long-running process.
    #[tracing::instrument(skip(self, origin_values))]
    pub fn machine_for(&self, origin_values: &[FieldValue]) -> Result<Arc<Machine>> {
        let primary_index = self.primary_index();
        let origin_adapter = FieldAdapter::new(&self.config.origin_schema);

        let mut open_w = BitWriter::new();
        origin_adapter.write(&mut open_w, false, origin_values)?;
        let mut secret_w = BitWriter::new();
        origin_adapter.write(&mut secret_w, true, origin_values)?;

        let basis = TicketBasis::new(
            primary_index,
            open_w.into_bits(),
            secret_w.into_bits(),
            origin_adapter.adapt(origin_values),
            origin_values.to_vec(),
        );

        let now_ms = self.clock.now_ms();
        self.machines.retain(|_, m| !m.is_disposable(now_ms));

        let machine = self
            .machines
            .entry(basis.clone())
            .or_insert_with(|| {
                let sequence = self.sequence_provider.get_sequence(&basis);
                Arc::new(Machine::new(
                    primary_index,
                    self.specs[primary_index].clone(),
                    self.digests.clone(),
                    self.origin_schema.clone(),
                    self.data_schema.clone(),
                    basis,
                    sequence,
                ))
            })
            .clone();
        Ok(machine)
    }

    /// Issues a ticket for `origin_values`/`data_values` under the
    /// primary spec, using the current wall-clock time, presentation
    /// format, and configured character limit.
    pub fn issue(&self, origin_values: &[FieldValue], data_values: &[FieldValue]) -> Result<Ticket> {
        let machine = self.machine_for(origin_values)?;
        let now_ms = self.clock.now_ms();
        let format = self.format();
        machine.issue(now_ms, &format, self.config.char_limit, data_values)
    }

    /// Decodes a previously-issued ticket string against whichever
    /// spec it names, verifying its integrity tag if the spec
    /// requires one.
    #[tracing::instrument(skip(self, s))]
    pub fn decode(&self, s: &str) -> Result<Ticket> {
        let format = self.format();
        let bits = format.decode(s, self.config.char_limit)?;
        let mut reader = BitReader::new(&bits);

        let version = reader.read_positive_int()?;
        if version != 0 {
            return Err(TicketError::WrongVersion(version as u64));
        }

        let spec_index = reader.read_positive_int()? as usize;
        let spec = self
            .specs
            .get(spec_index)
            .ok_or(TicketError::UnknownSpec(spec_index as u64))?;

        let ts = reader.read_positive_long()? as i64;
        let seq = reader.read_positive_long()?;

        let origin_adapter = FieldAdapter::new(&self.config.origin_schema);
        let data_adapter = FieldAdapter::new(&self.config.data_schema);

        let mut origin_values = self.config.origin_schema.default_record();
        origin_adapter.read(&mut reader, false, &mut origin_values)?;

        let mut data_values = self.config.data_schema.default_record();
        data_adapter.read(&mut reader, false, &mut data_values)?;

        let prefix_end = reader.position();
        let s_length = reader.read_positive_int()? as usize;
        if s_length > 0 {
            if s_length > MAX_SECRET_PAYLOAD_BITS {
                return Err(TicketError::Malformed(format!(
                    "secret block ({s_length} bits) exceeds the {MAX_SECRET_PAYLOAD_BITS}-bit cap"
                )));
            }
            let prefix_bytes = pack_msb(reader.range_view(0, prefix_end));
            let digest = self.digests.digest(spec_index, &prefix_bytes);
            let sealed = reader.read_raw_bits(s_length)?;
            let pad = bits_from_bytes(&digest);
            if s_length > pad.len() {
                return Err(TicketError::Malformed(format!(
                    "secret block ({s_length} bits) exceeds the available pad"
                )));
            }
            let secret_bits = xor_bits(&sealed, &pad[..s_length]);
            let mut secret_reader = BitReader::new(&secret_bits);
            origin_adapter.read(&mut secret_reader, true, &mut origin_values)?;
            data_adapter.read(&mut secret_reader, true, &mut data_values)?;
            secret_reader.read_positive_long()?; // the length-hiding nonce, discarded
        }

        let pre_tag_end = reader.position();
        let expected_tag = self.digests.hash_tag(spec_index, spec.hash_length_bits, reader.range_view(0, pre_tag_end));
        if !expected_tag.is_empty() {
            let actual_tag = reader.read_raw_bits(expected_tag.len())?;
            if actual_tag != expected_tag {
                return Err(TicketError::BadHash);
            }
        }

        let trailing = reader.size() - reader.position();
        if trailing > 4 {
            return Err(TicketError::Malformed(format!(
                "{trailing} trailing bits exceed the 4-bit padding allowance"
            )));
        }
        if reader.read_raw_bits(trailing)?.any() {
            return Err(TicketError::Malformed("non-zero padding bits".into()));
        }

        Ok(Ticket::new(
            spec_index,
            spec.to_absolute_ms(ts),
            seq,
            origin_adapter.adapt(&origin_values),
            data_adapter.adapt(&data_values),
            bits,
            s.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        schema::{Field, FieldKind, FieldSchema},
        spec_digest::Granularity,
    };

    fn config(hash_bits: u32) -> TicketConfig {
        let spec = TicketSpec::new(chrono_tz::UTC, Granularity::Second, 2000, hash_bits).expect("spec");
        TicketConfig::new(
            FieldSchema::new(vec![Field::new(0, FieldKind::Str, false)]).expect("origin schema"),
            FieldSchema::new(vec![Field::new(0, FieldKind::I32, false)]).expect("data schema"),
            vec![spec],
            256,
        )
        .expect("config")
    }

    fn fixed_factory(hash_bits: u32, now_ms: i64) -> Factory {
        Factory::with_components(
            config(hash_bits),
            vec![],
            Arc::new(DefaultSequenceProvider::new()),
            Arc::new(FixedClock(now_ms)),
        )
    }

    #[test]
    fn round_trips_a_vanilla_ticket() {
        let factory = fixed_factory(32, 946_684_800_000 + 10_000);
        let origin = vec![FieldValue::Str("tenant-a".into())];
        let data = vec![FieldValue::I32(42)];
        let ticket = factory.issue(&origin, &data).expect("issue");
        let decoded = factory.decode(&ticket.string_image).expect("decode");
        assert_eq!(decoded, ticket);
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.origin, origin);
    }

    #[test]
    fn flipping_a_character_breaks_the_hash() {
        let factory = fixed_factory(32, 946_684_800_000 + 10_000);
        let ticket = factory
            .issue(&[FieldValue::Str("t".into())], &[FieldValue::I32(1)])
            .expect("issue");
        let mut chars: Vec<char> = ticket.string_image.chars().collect();
        let flip_at = chars.iter().position(|c| c.is_ascii_alphanumeric()).expect("a symbol char");
        chars[flip_at] = if chars[flip_at] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        let err = factory.decode(&tampered).unwrap_err();
        assert!(matches!(err, TicketError::BadHash | TicketError::Malformed(_)));
    }

    #[test]
    fn zero_hash_length_skips_verification() {
        let factory = fixed_factory(0, 946_684_800_000 + 10_000);
        let ticket = factory
            .issue(&[FieldValue::Str("t".into())], &[FieldValue::I32(1)])
            .expect("issue");
        let decoded = factory.decode(&ticket.string_image).expect("decode");
        assert_eq!(decoded.data, ticket.data);
    }

    #[test]
    fn distinct_origins_get_independent_sequence_counters() {
        let factory = fixed_factory(32, 946_684_800_000 + 10_000);
        let a1 = factory.issue(&[FieldValue::Str("a".into())], &[FieldValue::I32(0)]).expect("issue");
        let a2 = factory.issue(&[FieldValue::Str("a".into())], &[FieldValue::I32(0)]).expect("issue");
        let b1 = factory.issue(&[FieldValue::Str("b".into())], &[FieldValue::I32(0)]).expect("issue");
        assert_eq!(a1.sequence_number, 0);
        assert_eq!(a2.sequence_number, 1);
        assert_eq!(b1.sequence_number, 0);
    }

    #[test]
    fn trailing_non_zero_padding_is_malformed() {
        let factory = fixed_factory(32, 946_684_800_000 + 10_000);
        let ticket = factory
            .issue(&[FieldValue::Str("t".into())], &[FieldValue::I32(1)])
            .expect("issue");

        let mut bits = ticket.bit_image.clone();
        let last = bits.len() - 1;
        bits.set(last, !bits[last]);
        let format = factory.format();
        let tampered = format.encode(&bits, 4096).expect("encode");

        let err = factory.decode(&tampered).unwrap_err();
        assert!(matches!(err, TicketError::BadHash | TicketError::Malformed(_)));
    }

    #[test]
    fn secret_length_over_the_160_bit_cap_is_malformed() {
        let factory = fixed_factory(0, 946_684_800_000 + 10_000);

        let mut w = BitWriter::new();
        w.write_positive_int(0); // version
        w.write_positive_int(0); // spec_index
        w.write_positive_long(10_000); // timestamp
        w.write_positive_long(0); // sequence
        // open origin (Str "") + open data (I32 0), matching `config`'s schema.
        w.write_positive_int(1);
        w.write_string("");
        w.write_positive_int(1);
        w.write_int(0);
        w.write_positive_int(161); // oversized secret length
        let pad = (5 - w.position() % 5) % 5;
        for _ in 0..pad {
            w.write_bit(false);
        }
        let bits = w.into_bits();
        let format = factory.format();
        let s = format.encode(&bits, 4096).expect("encode");

        let err = factory.decode(&s).unwrap_err();
        assert!(matches!(err, TicketError::Malformed(_)));
    }
}
