// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Counting wake signal between producers and the flush loop.
//!
//! One primitive serves two purposes:
//! - every accepted reading releases one permit ("data available");
//! - shutdown releases one extra permit so a flush loop blocked with an
//!   empty buffer wakes up and sees the running flag cleared.
//!
//! Splitting these into two primitives would leave the loop asleep on
//! shutdown unless it waited on both.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of waiting on a [`WakeSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A permit was taken.
    Acquired,
    /// [`WakeSignal::interrupt`] was called while waiting; no permit taken.
    Interrupted,
    /// The timeout elapsed; no permit taken.
    TimedOut,
}

#[derive(Debug, Default)]
struct WakeState {
    permits: u64,
    /// Bumped by every interrupt; waiters compare against the value they saw
    /// on entry.
    interrupts: u64,
}

/// Non-negative permit counter with blocking, interruptible acquire.
#[derive(Debug, Default)]
pub struct WakeSignal {
    state: Mutex<WakeState>,
    condvar: Condvar,
}

impl WakeSignal {
    /// Create a signal with no permits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one permit and wake one waiter. Never blocks beyond the state lock.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits = state.permits.saturating_add(1);
        drop(state);
        self.condvar.notify_one();
    }

    /// Block until a permit is available and take it.
    ///
    /// Returns [`Acquire::Interrupted`] if [`interrupt`](Self::interrupt) is
    /// called while no permit is available; the caller decides whether to
    /// wait again.
    pub fn acquire_blocking(&self) -> Acquire {
        let mut state = self.state.lock();
        let seen = state.interrupts;
        loop {
            if state.permits > 0 {
                state.permits -= 1;
                return Acquire::Acquired;
            }
            if state.interrupts != seen {
                return Acquire::Interrupted;
            }
            self.condvar.wait(&mut state);
        }
    }

    /// Like [`acquire_blocking`](Self::acquire_blocking) but gives up after
    /// `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Acquire {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let seen = state.interrupts;
        loop {
            if state.permits > 0 {
                state.permits -= 1;
                return Acquire::Acquired;
            }
            if state.interrupts != seen {
                return Acquire::Interrupted;
            }
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                // A release may have raced the timeout.
                if state.permits > 0 {
                    state.permits -= 1;
                    return Acquire::Acquired;
                }
                return Acquire::TimedOut;
            }
        }
    }

    /// Take a permit if one is available, without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Wake every blocked waiter with [`Acquire::Interrupted`].
    ///
    /// Permits are left untouched; waiters that find one take it instead.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupts = state.interrupts.wrapping_add(1);
        drop(state);
        self.condvar.notify_all();
    }

    /// Number of permits not yet taken.
    pub fn available(&self) -> u64 {
        self.state.lock().permits
    }
}
