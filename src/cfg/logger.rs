// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Logger initialization. A ticket codec run from a CLI doesn't need
//! span-field capture or file rotation, so this keeps only
//! `tracing_subscriber`'s human-readable formatter and `EnvFilter`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. `level` is an
/// `EnvFilter` directive (e.g. `"info"`, `"ticketforge=debug"`);
/// `RUST_LOG` overrides it if set.
pub fn init_logger(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .context("failed to parse log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set global default subscriber: {e}"))
}
