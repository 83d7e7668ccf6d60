// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! [`TicketConfig`]: the declarative description of a ticket system —
//! origin/data record shapes and the ordered list of spec generations
//! a factory understands.
//!
//! Loaded from YAML: `serde_yaml::from_str` over a file read with
//! `std::fs::read_to_string`, wrapped in [`crate::error::TicketError`]
//! via a descriptive `InvalidArgument`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, TicketError},
    schema::FieldSchema,
    spec_digest::TicketSpec,
};

/// The default `char_limit` applied when a config omits it.
pub const DEFAULT_CHAR_LIMIT: usize = 256;

fn default_char_limit() -> usize {
    DEFAULT_CHAR_LIMIT
}

/// A ticket system's full declarative shape. `specs` is ordered
/// oldest-first; the last entry is the primary spec new tickets are
/// issued under, and every earlier entry remains valid for decoding
/// previously-issued tickets ("spec rollover").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    pub origin_schema: FieldSchema,
    pub data_schema: FieldSchema,
    pub specs: Vec<TicketSpec>,
    #[serde(default = "default_char_limit")]
    pub char_limit: usize,
}

impl TicketConfig {
    pub fn new(
        origin_schema: FieldSchema,
        data_schema: FieldSchema,
        specs: Vec<TicketSpec>,
        char_limit: usize,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(TicketError::InvalidArgument("specs must not be empty".into()));
        }
        Ok(Self { origin_schema, data_schema, specs, char_limit })
    }

    /// The index of the spec new tickets are issued under — always
    /// the last entry in `specs`.
    pub fn primary_index(&self) -> usize {
        self.specs.len() - 1
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TicketError::InvalidArgument(format!("reading config {}: {e}", path.display()))
        })?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: TicketConfig = serde_yaml::from_str(contents)
            .map_err(|e| TicketError::InvalidArgument(format!("parsing config: {e}")))?;
        if config.specs.is_empty() {
            return Err(TicketError::InvalidArgument("specs must not be empty".into()));
        }
        Ok(config)
    }
}
