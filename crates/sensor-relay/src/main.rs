// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor Relay CLI
//!
//! Forward readings from the given sensor ids to InfluxDB.
//!
//! # Usage
//!
//! ```bash
//! # Watch two sensors, events as "<id> <value> [<timestamp>]" lines on stdin
//! sensor-relay 135 0x88
//!
//! # Custom endpoint and events from a FIFO
//! sensor-relay --url "http://db:8086/write?db=pool" --input /run/sensors.fifo 135
//!
//! # Everything from a YAML file
//! sensor-relay --config /etc/sensor-relay.yaml 135
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use sensor_relay::{
    install_signal_handler, parse_sensor_id, EventFeed, FlushLoop, HttpSink, LineFeed,
    RelayConfig, RelayContext, SensorId, StopHandle, WatchSet,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "sensor-relay")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forward watched sensor readings to InfluxDB in batches")]
#[command(long_about = None)]
#[command(allow_negative_numbers = true)]
struct Cli {
    /// Sensor ids to forward (decimal, 0x-prefixed hex or 0-prefixed octal)
    #[arg(value_name = "SENSOR_ID", value_parser = parse_sensor_id)]
    sensor_ids: Vec<SensorId>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// InfluxDB write URL (overrides the configuration file)
    #[arg(long)]
    url: Option<String>,

    /// Read events from this file or FIFO instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Do not post readings still pending at shutdown
    #[arg(long)]
    no_final_flush: bool,

    /// Verbose mode (log filtered events)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Some(usage) = missing_ids_usage(&cli) {
        println!("{}", usage);
        return Ok(ExitCode::FAILURE);
    }

    let default_filter = if cli.verbose {
        "sensor_relay=debug"
    } else {
        "sensor_relay=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;
    let watch = WatchSet::new(cli.sensor_ids.iter().copied());

    let sink = HttpSink::new(&config.influxdb).context("Failed to create HTTP sink")?;
    let ctx = RelayContext::new(watch);
    install_signal_handler(StopHandle::new(&ctx)).context("Failed to set up shutdown")?;

    let mut feed: Box<dyn EventFeed> = match cli.input {
        Some(ref path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open event input {}", path.display()))?;
            Box::new(LineFeed::new(BufReader::new(file)))
        }
        None => Box::new(LineFeed::new(BufReader::new(std::io::stdin()))),
    };
    feed.subscribe(ctx.callback())
        .context("Failed to register sensor callback")?;

    let watched = ctx.watch_set();
    tracing::info!(
        url = %config.influxdb.url,
        "Init done, listening for sensor{}: {}",
        if watched.len() == 1 { "" } else { "s" },
        watched
    );

    let mut flush = FlushLoop::new(Arc::clone(&ctx), config.encoder(), sink)
        .final_flush(config.final_flush);
    let stats = flush.run();

    tracing::info!("Shutting down");

    if let Err(err) = feed.unsubscribe() {
        tracing::warn!("Failed to unregister callback: {}", err);
    }

    let ingest = ctx.ingest_stats();
    tracing::info!(
        accepted = ingest.accepted,
        unwatched = ingest.unwatched,
        malformed = ingest.malformed,
        batches_posted = stats.batches_posted,
        readings_posted = stats.readings_posted,
        post_failures = stats.post_failures,
        readings_dropped = stats.readings_dropped,
        "Exit"
    );

    Ok(ExitCode::SUCCESS)
}

/// Usage text when no sensor id was given; the relay must not start then.
fn missing_ids_usage(cli: &Cli) -> Option<String> {
    cli.sensor_ids
        .is_empty()
        .then(|| Cli::command().render_usage().to_string())
}

fn build_config(cli: &Cli) -> Result<RelayConfig> {
    let mut config = match cli.config {
        Some(ref path) => RelayConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => RelayConfig::default(),
    };

    if let Some(ref url) = cli.url {
        config.influxdb.url = url.clone();
    }
    if cli.no_final_flush {
        config.final_flush = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}
