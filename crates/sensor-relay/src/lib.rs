// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor Relay
//!
//! Forward temperature readings from watched sensors to an InfluxDB write
//! endpoint, in batches encoded as Line Protocol.
//!
//! # Overview
//!
//! ```text
//! EventFeed --> RelayContext::ingest --> Accumulator --> FlushLoop --> LineEncoder --> BatchSink
//!                (filter + append)        (drain_all)    (WakeSignal)
//! ```
//!
//! - Events from sensors outside the [`WatchSet`], and events whose value
//!   is not a finite number, are dropped silently.
//! - Every accepted reading releases one [`WakeSignal`] permit; the flush
//!   loop drains the whole [`Accumulator`] per wake-up and posts it.
//! - Delivery is best effort: a failed post discards its batch.
//! - [`StopHandle::stop`] clears the running flag and releases the wake
//!   signal so the loop terminates promptly.
//!
//! # Example
//!
//! ```rust,no_run
//! use sensor_relay::{
//!     install_signal_handler, EventFeed, FlushLoop, HttpSink, LineFeed, RelayConfig,
//!     RelayContext, StopHandle, WatchSet,
//! };
//! use std::io::BufReader;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RelayConfig::default();
//! let ctx = RelayContext::new(WatchSet::new([135, 136]));
//! install_signal_handler(StopHandle::new(&ctx))?;
//!
//! let mut feed = LineFeed::new(BufReader::new(std::io::stdin()));
//! feed.subscribe(ctx.callback())?;
//!
//! let sink = HttpSink::new(&config.influxdb)?;
//! let stats = FlushLoop::new(Arc::clone(&ctx), config.encoder(), sink).run();
//! feed.unsubscribe()?;
//! println!("posted {} readings", stats.readings_posted);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod config;
pub mod feed;
pub mod filter;
pub mod influx;
pub mod reading;
pub mod relay;
pub mod shutdown;
pub mod sink;
pub mod wake;

pub use buffer::Accumulator;
pub use config::{ConfigError, InfluxDbConfig, RelayConfig};
pub use feed::{ChannelFeed, EventCallback, EventFeed, FeedError, LineFeed, SensorEvent};
pub use filter::{parse_sensor_id, parse_value, ReadingFilter, Rejected, WatchSet};
pub use influx::LineEncoder;
pub use reading::{id_list, Reading, SensorId};
pub use relay::{FlushLoop, FlushOutcome, FlushStats, IngestStats, RelayContext};
pub use shutdown::{install_signal_handler, ShutdownError, StopHandle};
pub use sink::{BatchSink, HttpSink, SinkError};
pub use wake::{Acquire, WakeSignal};
