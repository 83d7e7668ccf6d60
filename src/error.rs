// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The single error type surfaced by every public entry point.
//!
//! Every failure in this crate — bad input, a forged ticket, an
//! exhausted sequence counter — collapses to one of the
//! [`TicketError`] discriminants below. None of them may carry secret
//! key material or decrypted secret-field values; only lengths,
//! indices, and spec identifiers are safe to embed in a message.

use thiserror::Error;

/// The discriminants a caller can match on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Null/empty input, too many values, wrong value type, illegal
    /// schema.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The encoded (or about-to-be-encoded) string exceeds
    /// `char_limit`.
    #[error("ticket string exceeds the {limit}-character limit ({actual} chars)")]
    TooLong { limit: usize, actual: usize },

    /// A non-printable or non-ASCII byte appeared in a ticket string.
    #[error("invalid character at byte offset {0}")]
    InvalidChar(usize),

    /// The encoded `VERSION` field isn't one this factory understands.
    #[error("unsupported ticket version: {0}")]
    WrongVersion(u64),

    /// `spec_index` exceeds the factory's primary index.
    #[error("unknown spec index: {0}")]
    UnknownSpec(u64),

    /// The sequence counter for a basis would overflow, or returned a
    /// negative value.
    #[error("sequence counter exhausted")]
    SequenceExhausted,

    /// The integrity tag didn't match.
    #[error("integrity hash mismatch")]
    BadHash,

    /// Bit-stream under/overflow, non-zero reserved padding, a field
    /// count exceeding the schema, leftover bits in the secret block,
    /// or a secret length outside `[0, 160]`.
    #[error("malformed ticket: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, TicketError>;
