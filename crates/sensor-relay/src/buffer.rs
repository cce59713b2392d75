// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Accumulation buffer shared between event callbacks and the flush loop.
//!
//! Producers append under a short critical section; the flush loop takes
//! the whole pending batch in one swap.

use crate::reading::Reading;
use parking_lot::Mutex;

/// Unbounded, append-only buffer of pending readings.
///
/// - `append` is safe from any number of producer threads.
/// - `drain_all` atomically hands back every pending reading in insertion
///   order and leaves the buffer empty.
///
/// A reading is seen by exactly one drain: either the one that took the lock
/// after the append, or none if the process dies first.
#[derive(Debug, Default)]
pub struct Accumulator {
    pending: Mutex<Vec<Reading>>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading at the tail.
    pub fn append(&self, reading: Reading) {
        self.pending.lock().push(reading);
    }

    /// Take every pending reading, oldest first.
    pub fn drain_all(&self) -> Vec<Reading> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Get the current number of pending readings.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_returns_insertion_order() {
        let acc = Accumulator::new();
        acc.append(Reading::new(1, 1.0, 10));
        acc.append(Reading::new(2, 2.0, 11));
        acc.append(Reading::new(1, 3.0, 12));

        let batch = acc.drain_all();
        let ids: Vec<_> = batch.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![1, 2, 1]);
    }

    #[test]
    fn test_drain_leaves_buffer_empty() {
        let acc = Accumulator::new();
        acc.append(Reading::new(1, 1.0, 10));
        assert_eq!(acc.len(), 1);

        assert_eq!(acc.drain_all().len(), 1);
        assert!(acc.is_empty());
        assert!(acc.drain_all().is_empty());
    }

    #[test]
    fn test_concurrent_appends_are_all_drained_once() {
        const PRODUCERS: i32 = 8;
        const PER_PRODUCER: i64 = 500;

        let acc = Arc::new(Accumulator::new());
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|id| {
                let acc = Arc::clone(&acc);
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        acc.append(Reading::new(id, 0.0, seq));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let batch = acc.drain_all();
        assert_eq!(batch.len(), (PRODUCERS as usize) * (PER_PRODUCER as usize));

        // Per-producer order survives interleaving.
        for id in 0..PRODUCERS {
            let seqs: Vec<_> = batch
                .iter()
                .filter(|r| r.sensor_id == id)
                .map(|r| r.timestamp_secs)
                .collect();
            assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
