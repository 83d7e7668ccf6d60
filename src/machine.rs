// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! [`Machine`]: assembles and issues tickets for one `(spec, origin)`
//! basis.
//!
//! A `Machine` is deliberately decoupled from [`crate::factory::Factory`]:
//! it takes the current wall-clock time, presentation format and
//! character limit as plain arguments rather than holding a back
//! reference to the factory that owns it, which would otherwise need
//! to be a `Weak` to avoid a reference cycle through the factory's own
//! machine cache. The factory supplies all three at each call site.

use std::sync::Arc;

use crate::{
    basis::TicketBasis,
    bitio::{xor_bits, BitWriter},
    error::{Result, TicketError},
    format::TicketFormat,
    nonce::derive_nonce,
    schema::{FieldAdapter, FieldSchema, FieldValue},
    sequence::SequenceHandle,
    spec_digest::{bits_from_bytes, DigestRing, TicketSpec, MAX_SECRET_PAYLOAD_BITS},
    ticket::Ticket,
};

/// One `(spec, origin)` issuance point. Holds everything needed to
/// assemble a ticket's bit image except the caller-supplied data
/// payload, the wall-clock time, and the presentation format, all of
/// which vary per call.
pub struct Machine {
    pub(crate) spec_index: usize,
    spec: Arc<TicketSpec>,
    digests: Arc<DigestRing>,
    origin_schema: Arc<FieldSchema>,
    data_schema: Arc<FieldSchema>,
    basis: TicketBasis,
    sequence: Arc<dyn SequenceHandle>,
    has_secret: bool,
}

impl Machine {
    pub fn new(
        spec_index: usize,
        spec: Arc<TicketSpec>,
        digests: Arc<DigestRing>,
        origin_schema: Arc<FieldSchema>,
        data_schema: Arc<FieldSchema>,
        basis: TicketBasis,
        sequence: Arc<dyn SequenceHandle>,
    ) -> Self {
        let has_secret = origin_schema.has_secret_fields() || data_schema.has_secret_fields();
        Self { spec_index, spec, digests, origin_schema, data_schema, basis, sequence, has_secret }
    }

    pub fn basis(&self) -> &TicketBasis {
        &self.basis
    }

    /// True once this machine's sequence counter has gone idle for the
    /// current moment — the condition under which the factory is free
    /// to evict it from the machines cache.
    pub fn is_disposable(&self, now_ms: i64) -> bool {
        self.sequence.is_unsequenced(self.spec.to_spec_timestamp(now_ms))
    }

    /// Assembles and formats one ticket. `now_ms` and `format`/`char_limit`
    /// are supplied by the caller (ordinarily the factory) rather than
    /// read back off `self`, keeping this method pure and unit-testable.
    #[tracing::instrument(skip(self, format, data_values), fields(spec_index = self.spec_index))]
    pub fn issue(
        &self,
        now_ms: i64,
        format: &TicketFormat,
        char_limit: usize,
        data_values: &[FieldValue],
    ) -> Result<Ticket> {
        let ts = self.spec.to_spec_timestamp(now_ms);
        if ts < 0 {
            return Err(TicketError::InvalidArgument(
                "timestamp precedes this spec's origin".into(),
            ));
        }
        let seq = self.sequence.next(ts)?;

        let mut w = BitWriter::new();
        w.write_positive_int(0); // format version
        w.write_positive_int(self.spec_index as u32);
        w.write_positive_long(ts as u64);
        w.write_positive_long(seq);
        w.write_raw_bits(&self.basis.open_origin_bits);

        let data_adapter = FieldAdapter::new(&self.data_schema);
        data_adapter.write(&mut w, false, data_values)?;

        if self.has_secret {
            let prefix = w.to_bytes();
            let digest = self.digests.digest(self.spec_index, &prefix);

            let origin_adapter = FieldAdapter::new(&self.origin_schema);
            let mut secret_w = BitWriter::new();
            origin_adapter.write(&mut secret_w, true, &self.basis.raw_values)?;
            data_adapter.write(&mut secret_w, true, data_values)?;
            secret_w.write_positive_long(derive_nonce(&digest));

            let secret_bits = secret_w.into_bits();
            if secret_bits.len() > MAX_SECRET_PAYLOAD_BITS {
                return Err(TicketError::InvalidArgument(format!(
                    "secret payload ({} bits) exceeds the {MAX_SECRET_PAYLOAD_BITS}-bit cap",
                    secret_bits.len()
                )));
            }

            w.write_positive_int(secret_bits.len() as u32);
            let pad = bits_from_bytes(&digest);
            let sealed = xor_bits(&secret_bits, &pad[..secret_bits.len()]);
            w.write_raw_bits(&sealed);
        } else {
            w.write_positive_int(0);
        }

        let tag = self.digests.hash_tag(self.spec_index, self.spec.hash_length_bits, w.as_bits());
        w.write_raw_bits(&tag);

        let pad_len = (4 - (w.position() + 4) % 5) % 5;
        for _ in 0..pad_len {
            w.write_bit(false);
        }

        let bits = w.into_bits();
        let string_image = format.encode(&bits, char_limit)?;

        Ok(Ticket::new(
            self.spec_index,
            self.spec.to_absolute_ms(ts),
            seq,
            self.basis.origin_record.clone(),
            data_adapter.adapt(data_values),
            bits,
            string_image,
        ))
    }
}
