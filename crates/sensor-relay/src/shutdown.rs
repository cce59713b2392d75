// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative shutdown.
//!
//! Stopping clears the running flag and releases the wake signal once, so
//! a flush loop blocked on an empty buffer still notices. The signal
//! handler does nothing else; logging and teardown stay on the main thread.

use crate::relay::RelayContext;
use std::sync::Arc;
use thiserror::Error;

/// Shutdown errors.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("Failed to install signal handler: {0}")]
    Handler(#[from] ctrlc::Error),
}

/// Handle to stop a running relay from another thread.
#[derive(Clone)]
pub struct StopHandle {
    ctx: Arc<RelayContext>,
}

impl StopHandle {
    /// Create a handle for a relay context.
    pub fn new(ctx: &Arc<RelayContext>) -> Self {
        Self {
            ctx: Arc::clone(ctx),
        }
    }

    /// Request shutdown. Only the first call has an effect.
    pub fn stop(&self) {
        self.ctx.request_stop();
    }

    /// Check whether shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        !self.ctx.is_running()
    }
}

/// Route SIGINT and SIGTERM to `stop_handle`.
///
/// Can be installed once per process.
pub fn install_signal_handler(stop_handle: StopHandle) -> Result<(), ShutdownError> {
    ctrlc::set_handler(move || stop_handle.stop())?;
    Ok(())
}
