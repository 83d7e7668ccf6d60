// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Issues and decodes a handful of demonstration tickets against a
//! configured ticket system, mirroring a small slice of what a real
//! caller would wire up: load config, init logging, build a `Factory`,
//! issue, decode.

use anyhow::{Context, Result};
use ticketforge::{
    cfg::{cli::resolve_config_path, logger::init_logger},
    config::TicketConfig,
    factory::Factory,
    schema::FieldValue,
};
use tracing::info;

fn main() -> Result<()> {
    init_logger("info").context("failed to initialize logger")?;

    let config_path =
        resolve_config_path("config/ticket.yaml").context("failed to resolve config path")?;
    let config = TicketConfig::load_from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let factory = Factory::new(config, vec![b"demo-secret-key".to_vec()]);

    let origin = vec![FieldValue::Str("tenant-demo".into())];
    let data = vec![FieldValue::I32(1)];

    let ticket = factory.issue(&origin, &data).context("issue failed")?;
    info!(ticket = %ticket, "issued ticket");

    let decoded = factory.decode(&ticket.string_image).context("decode failed")?;
    info!(
        sequence_number = decoded.sequence_number,
        timestamp_ms = decoded.timestamp_ms,
        "decoded ticket"
    );

    Ok(())
}
