// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-basis sequence counters.
//!
//! [`TicketSequence`] itself holds no synchronization; [`SequenceHandle`]
//! wraps one behind a mutex so a single basis's counter is safe to
//! drive from multiple threads, and [`SequenceProvider`] is the
//! injection seam a caller can implement against durable storage
//! instead of the in-memory [`DefaultSequenceProvider`].

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::{
    basis::TicketBasis,
    error::{Result, TicketError},
};

/// A per-basis counter that disambiguates tickets sharing a
/// timestamp. Non-decreasing with the highest timestamp seen; older
/// timestamps are tolerated and proceed with the existing counter.
#[derive(Debug, Default)]
pub struct TicketSequence {
    last_ts: Option<i64>,
    counter: u64,
}

impl TicketSequence {
    pub fn new() -> Self {
        Self { last_ts: None, counter: 0 }
    }

    /// Returns the next sequence number for `ts`, resetting the
    /// counter to 0 first if `ts` is strictly newer than any timestamp
    /// seen so far.
    pub fn next(&mut self, ts: i64) -> Result<u64> {
        if self.last_ts.is_none_or(|last| ts > last) {
            self.counter = 0;
            self.last_ts = Some(ts);
        }
        let seq = self.counter;
        self.counter = self.counter.checked_add(1).ok_or(TicketError::SequenceExhausted)?;
        Ok(seq)
    }

    /// True iff the counter has never advanced, or `ts` is newer than
    /// the last timestamp seen — the condition the factory uses to
    /// evict idle machines.
    pub fn is_unsequenced(&self, ts: i64) -> bool {
        self.counter == 0 || self.last_ts.is_none_or(|last| ts > last)
    }
}

/// A thread-safe handle to one basis's [`TicketSequence`].
pub trait SequenceHandle: Send + Sync {
    fn next(&self, ts: i64) -> Result<u64>;
    fn is_unsequenced(&self, ts: i64) -> bool;
}

struct MutexSequence(Mutex<TicketSequence>);

impl SequenceHandle for MutexSequence {
    fn next(&self, ts: i64) -> Result<u64> {
        self.0.lock().expect("sequence mutex poisoned").next(ts)
    }

    fn is_unsequenced(&self, ts: i64) -> bool {
        self.0.lock().expect("sequence mutex poisoned").is_unsequenced(ts)
    }
}

/// Allocates (and durably tracks, if the implementation chooses to)
/// sequence counters keyed by basis. Implementations may be injected
/// in place of [`DefaultSequenceProvider`] for cross-process
/// durability.
pub trait SequenceProvider: Send + Sync {
    fn get_sequence(&self, basis: &TicketBasis) -> Arc<dyn SequenceHandle>;
}

/// The built-in, in-memory sequence provider: one mutex-guarded
/// counter per basis, stored in a concurrent map.
#[derive(Default)]
pub struct DefaultSequenceProvider {
    table: DashMap<TicketBasis, Arc<dyn SequenceHandle>>,
}

impl DefaultSequenceProvider {
    pub fn new() -> Self {
        Self { table: DashMap::new() }
    }
}

impl SequenceProvider for DefaultSequenceProvider {
    fn get_sequence(&self, basis: &TicketBasis) -> Arc<dyn SequenceHandle> {
        self.table
            .entry(basis.clone())
            .or_insert_with(|| Arc::new(MutexSequence(Mutex::new(TicketSequence::new()))))
            .clone()
    }
}
