// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay orchestration: producer path and flush loop.
//!
//! ```text
//! feed callback --> ReadingFilter --> Accumulator --release--> WakeSignal
//!                                          |                      |
//!                                          +---- drain_all <-- FlushLoop --> LineEncoder --> BatchSink
//! ```

use crate::buffer::Accumulator;
use crate::feed::{EventCallback, SensorEvent};
use crate::filter::{ReadingFilter, Rejected, WatchSet};
use crate::influx::LineEncoder;
use crate::reading::{id_list, plural, Reading};
use crate::sink::BatchSink;
use crate::wake::{Acquire, WakeSignal};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// State shared by event callbacks, the flush loop and the stop handle.
///
/// The accumulator is the only mutable resource; the watch set is fixed at
/// construction.
pub struct RelayContext {
    filter: ReadingFilter,
    buffer: Accumulator,
    wake: WakeSignal,
    running: AtomicBool,
    stats: IngestCounters,
}

#[derive(Default)]
struct IngestCounters {
    accepted: AtomicU64,
    unwatched: AtomicU64,
    malformed: AtomicU64,
}

/// Producer-side statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Readings appended to the accumulator.
    pub accepted: u64,
    /// Events from sensors outside the watch set.
    pub unwatched: u64,
    /// Events with an unparseable value.
    pub malformed: u64,
}

impl RelayContext {
    /// Create a running context for a watch set.
    pub fn new(watch: WatchSet) -> Arc<Self> {
        Arc::new(Self {
            filter: ReadingFilter::new(watch),
            buffer: Accumulator::new(),
            wake: WakeSignal::new(),
            running: AtomicBool::new(true),
            stats: IngestCounters::default(),
        })
    }

    /// Filter one event; on success append it and wake the flush loop.
    ///
    /// The append completes before the release, so a flush loop that takes
    /// the permit always finds the reading (or a later drain already took it).
    pub fn ingest(&self, event: &SensorEvent) -> Result<Reading, Rejected> {
        match self.filter.filter(event) {
            Ok(reading) => {
                self.buffer.append(reading);
                self.wake.release();
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(reading)
            }
            Err(rejected) => {
                match &rejected {
                    Rejected::Unwatched(id) => {
                        self.stats.unwatched.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("Ignoring measurement from sensor id {}", id);
                    }
                    Rejected::Malformed { .. } => {
                        self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!("Dropping event: {}", rejected);
                    }
                }
                Err(rejected)
            }
        }
    }

    /// Callback to register with an event feed.
    pub fn callback(self: &Arc<Self>) -> EventCallback {
        let ctx = Arc::clone(self);
        Arc::new(move |event| {
            let _ = ctx.ingest(&event);
        })
    }

    /// Check the running flag.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag and release the wake signal, once.
    pub(crate) fn request_stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.wake.release();
        }
    }

    /// The configured watch set.
    pub fn watch_set(&self) -> &WatchSet {
        self.filter.watch_set()
    }

    /// Pending readings.
    pub fn buffer(&self) -> &Accumulator {
        &self.buffer
    }

    /// Wake signal between producers and the flush loop.
    pub fn wake(&self) -> &WakeSignal {
        &self.wake
    }

    /// Snapshot of producer counters.
    pub fn ingest_stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            unwatched: self.stats.unwatched.load(Ordering::Relaxed),
            malformed: self.stats.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Flush loop statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Batches the sink accepted.
    pub batches_posted: u64,
    /// Readings in accepted batches.
    pub readings_posted: u64,
    /// Batches the sink rejected.
    pub post_failures: u64,
    /// Readings lost with rejected batches.
    pub readings_dropped: u64,
    /// Wake-ups that found the buffer already drained.
    pub empty_wakeups: u64,
}

/// Outcome of one drain/encode/post pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; the sink was not called.
    Empty,
    /// The sink accepted this many readings.
    Posted(usize),
    /// The sink failed; this many readings were discarded.
    Failed(usize),
}

/// Single consumer that moves accumulated readings to a sink.
///
/// States, per iteration of [`run`](Self::run):
/// `WAITING` (block on the wake signal) → `DRAINING` → `ENCODING` →
/// `POSTING` → `WAITING`, leaving for `TERMINATED` from `WAITING` once the
/// running flag is clear.
pub struct FlushLoop<S> {
    ctx: Arc<RelayContext>,
    encoder: LineEncoder,
    sink: S,
    final_flush: bool,
    stats: FlushStats,
}

impl<S: BatchSink> FlushLoop<S> {
    /// Create a flush loop. Final flush is enabled by default.
    pub fn new(ctx: Arc<RelayContext>, encoder: LineEncoder, sink: S) -> Self {
        Self {
            ctx,
            encoder,
            sink,
            final_flush: true,
            stats: FlushStats::default(),
        }
    }

    /// Drain and post once more after the loop terminates.
    ///
    /// Without it, readings appended after the last wake-up but before
    /// shutdown are dropped.
    pub fn final_flush(mut self, enabled: bool) -> Self {
        self.final_flush = enabled;
        self
    }

    /// Run until the context stops (blocking).
    pub fn run(&mut self) -> FlushStats {
        while self.ctx.is_running() {
            match self.ctx.wake.acquire_blocking() {
                // Loop condition decides between re-waiting and terminating.
                Acquire::Interrupted | Acquire::TimedOut => continue,
                Acquire::Acquired => {}
            }
            if !self.ctx.is_running() {
                break;
            }
            self.flush_once();
        }

        if self.final_flush {
            match self.flush_once() {
                FlushOutcome::Empty => {}
                outcome => tracing::debug!(?outcome, "Final flush done"),
            }
        }

        self.stats.clone()
    }

    /// Drain everything pending, encode it and post it.
    pub fn flush_once(&mut self) -> FlushOutcome {
        let batch = self.ctx.buffer.drain_all();
        if batch.is_empty() {
            self.stats.empty_wakeups += 1;
            tracing::trace!("Woken with nothing to post");
            return FlushOutcome::Empty;
        }

        let count = batch.len();
        let ids = id_list(batch.iter().map(|r| r.sensor_id));
        let body = self.encoder.encode(&batch);

        match self.sink.post(&body) {
            Ok(()) => {
                self.stats.batches_posted += 1;
                self.stats.readings_posted += count as u64;
                tracing::info!(
                    "Posted {} value{} to influx db from sensor{}: {}",
                    count,
                    plural(count),
                    plural(count),
                    ids
                );
                FlushOutcome::Posted(count)
            }
            Err(err) => {
                self.stats.post_failures += 1;
                self.stats.readings_dropped += count as u64;
                tracing::error!(count, sensors = %ids, "Failed to post batch: {}", err);
                FlushOutcome::Failed(count)
            }
        }
    }

    /// Statistics so far.
    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// The sink batches are posted to.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
