// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Codec for compact, cryptographically defensible ASCII tickets: a
//! short string encoding a timestamp, a per-origin sequence number, an
//! origin descriptor, arbitrary payload data, and an optional
//! tamper-evident integrity tag.
//!
//! [`Factory`] is the entry point: build one from a [`TicketConfig`],
//! then [`Factory::issue`] and [`Factory::decode`] tickets.

pub mod basis;
pub mod bitio;
pub mod cfg;
pub mod clock;
pub mod config;
pub mod error;
pub mod factory;
pub mod format;
pub mod machine;
pub mod nonce;
pub mod schema;
pub mod sequence;
pub mod spec_digest;
pub mod ticket;

pub use config::TicketConfig;
pub use error::{Result, TicketError};
pub use factory::Factory;
pub use format::TicketFormat;
pub use schema::{Field, FieldKind, FieldSchema, FieldValue, Record};
pub use spec_digest::{Granularity, TicketSpec};
pub use ticket::Ticket;
