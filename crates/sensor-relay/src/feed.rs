// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor event feeds.
//!
//! A feed delivers raw events to one registered callback for the lifetime
//! of the process. Two feeds are provided:
//!
//! - [`LineFeed`]: text events read from any `BufRead` (stdin, a FIFO, a file)
//! - [`ChannelFeed`]: events pushed through a crossbeam channel
//!
//! Callbacks may run concurrently with each other and with the flush loop.
//! Once `unsubscribe` returns, the callback is never invoked again.

use crate::reading::SensorId;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

/// One raw event as delivered by the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEvent {
    /// Reporting sensor.
    pub sensor_id: SensorId,
    /// Value as text, not yet validated.
    pub raw_value: String,
    /// Event time, seconds since Unix epoch.
    pub timestamp_secs: i64,
}

impl SensorEvent {
    /// Create a new event.
    pub fn new(sensor_id: SensorId, raw_value: impl Into<String>, timestamp_secs: i64) -> Self {
        Self {
            sensor_id,
            raw_value: raw_value.into(),
            timestamp_secs,
        }
    }
}

/// Callback registered with a feed.
pub type EventCallback = Arc<dyn Fn(SensorEvent) + Send + Sync>;

/// Feed errors.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed already has a subscriber")]
    AlreadySubscribed,

    #[error("Feed has no subscriber")]
    NotSubscribed,

    #[error("Failed to spawn feed thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Feed dispatcher thread panicked")]
    DispatcherPanicked,
}

/// Source of sensor events.
pub trait EventFeed {
    /// Register the callback. A feed accepts one subscription.
    fn subscribe(&mut self, callback: EventCallback) -> Result<(), FeedError>;

    /// Stop delivering events.
    fn unsubscribe(&mut self) -> Result<(), FeedError>;
}

/// Delivery gate shared by a feed and its dispatcher thread.
///
/// Delivery holds the read side; closing takes the write side, so `close`
/// waits out any callback in flight.
struct Gate {
    open: RwLock<bool>,
    callback: EventCallback,
}

impl Gate {
    fn new(callback: EventCallback) -> Self {
        Self {
            open: RwLock::new(true),
            callback,
        }
    }

    fn deliver(&self, event: SensorEvent) -> bool {
        let open = self.open.read();
        if *open {
            (self.callback)(event);
        }
        *open
    }

    fn is_open(&self) -> bool {
        *self.open.read()
    }

    fn close(&self) {
        *self.open.write() = false;
    }
}

/// Parse one text event: `<id> <value> [<timestamp>]`.
///
/// Blank lines and `#` comments yield `None`, as do lines whose id or
/// timestamp is not an integer. The value is kept as text. A missing
/// timestamp is filled with `now_secs`.
pub fn parse_event_line(line: &str, now_secs: i64) -> Option<SensorEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let sensor_id = parts.next()?.parse::<SensorId>().ok()?;
    let raw_value = parts.next()?;
    let timestamp_secs = match parts.next() {
        Some(ts) => ts.parse::<i64>().ok()?,
        None => now_secs,
    };
    if parts.next().is_some() {
        return None;
    }

    Some(SensorEvent::new(sensor_id, raw_value, timestamp_secs))
}

/// Feed reading one event per line from a reader, on its own thread.
///
/// The reader may block indefinitely (stdin); unsubscribing closes the
/// gate and detaches the thread instead of joining it.
pub struct LineFeed<R> {
    reader: Option<R>,
    gate: Option<Arc<Gate>>,
    handle: Option<JoinHandle<()>>,
}

impl<R> LineFeed<R>
where
    R: BufRead + Send + 'static,
{
    /// Create a feed over a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            gate: None,
            handle: None,
        }
    }
}

impl<R> EventFeed for LineFeed<R>
where
    R: BufRead + Send + 'static,
{
    fn subscribe(&mut self, callback: EventCallback) -> Result<(), FeedError> {
        let reader = self.reader.take().ok_or(FeedError::AlreadySubscribed)?;
        let gate = Arc::new(Gate::new(callback));
        let thread_gate = Arc::clone(&gate);

        let handle = std::thread::Builder::new()
            .name("sensor-feed".into())
            .spawn(move || read_lines(reader, &thread_gate))?;

        self.gate = Some(gate);
        self.handle = Some(handle);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), FeedError> {
        let gate = self.gate.take().ok_or(FeedError::NotSubscribed)?;
        gate.close();
        // Joined only when already done; a blocked read would hang shutdown.
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() && handle.join().is_err() {
                return Err(FeedError::DispatcherPanicked);
            }
        }
        Ok(())
    }
}

fn read_lines<R: BufRead>(reader: R, gate: &Gate) {
    for line in reader.lines() {
        if !gate.is_open() {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("Sensor feed read failed: {}", err);
                return;
            }
        };
        match parse_event_line(&line, chrono::Utc::now().timestamp()) {
            Some(event) => {
                if !gate.deliver(event) {
                    return;
                }
            }
            None if !line.trim().is_empty() && !line.trim_start().starts_with('#') => {
                tracing::debug!("Ignoring malformed event line {:?}", line);
            }
            None => {}
        }
    }
    tracing::debug!("Sensor feed reached end of input");
}

/// How often an idle channel dispatcher checks the gate.
const CHANNEL_POLL: Duration = Duration::from_millis(50);

/// Feed fed through a crossbeam channel.
///
/// Events sent before `subscribe` are queued and delivered once a callback
/// is registered.
pub struct ChannelFeed {
    tx: Sender<SensorEvent>,
    rx: Option<Receiver<SensorEvent>>,
    gate: Option<Arc<Gate>>,
    handle: Option<JoinHandle<()>>,
}

impl ChannelFeed {
    /// Create a feed with an unbounded queue.
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            tx,
            rx: Some(rx),
            gate: None,
            handle: None,
        }
    }

    /// Sender side; clone freely across producer threads.
    pub fn sender(&self) -> Sender<SensorEvent> {
        self.tx.clone()
    }
}

impl Default for ChannelFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed for ChannelFeed {
    fn subscribe(&mut self, callback: EventCallback) -> Result<(), FeedError> {
        let rx = self.rx.take().ok_or(FeedError::AlreadySubscribed)?;
        let gate = Arc::new(Gate::new(callback));
        let thread_gate = Arc::clone(&gate);

        let handle = std::thread::Builder::new()
            .name("sensor-feed".into())
            .spawn(move || loop {
                match rx.recv_timeout(CHANNEL_POLL) {
                    Ok(event) => {
                        if !thread_gate.deliver(event) {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        if !thread_gate.is_open() {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            })?;

        self.gate = Some(gate);
        self.handle = Some(handle);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<(), FeedError> {
        let gate = self.gate.take().ok_or(FeedError::NotSubscribed)?;
        gate.close();
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| FeedError::DispatcherPanicked)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Cursor;
    use std::time::Instant;

    fn collector() -> (EventCallback, Arc<Mutex<Vec<SensorEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: EventCallback = Arc::new(move |event| sink.lock().push(event));
        (callback, seen)
    }

    fn wait_for(seen: &Mutex<Vec<SensorEvent>>, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for events");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_parse_event_line() {
        assert_eq!(
            parse_event_line("1 20.1 100", 0),
            Some(SensorEvent::new(1, "20.1", 100))
        );
        assert_eq!(
            parse_event_line("  -3\tabc  ", 42),
            Some(SensorEvent::new(-3, "abc", 42))
        );
        assert_eq!(parse_event_line("", 0), None);
        assert_eq!(parse_event_line("# 1 2 3", 0), None);
        assert_eq!(parse_event_line("x 20.1 100", 0), None);
        assert_eq!(parse_event_line("1", 0), None);
        assert_eq!(parse_event_line("1 20.1 soon", 0), None);
        assert_eq!(parse_event_line("1 20.1 100 extra", 0), None);
    }

    #[test]
    fn test_line_feed_delivers_in_order() {
        let input = "1 20.1 100\n\n# comment\nbogus\n2 19.0 102\n";
        let mut feed = LineFeed::new(Cursor::new(input.to_string()));
        let (callback, seen) = collector();

        feed.subscribe(callback).unwrap();
        wait_for(&seen, 2);

        assert_eq!(
            *seen.lock(),
            vec![SensorEvent::new(1, "20.1", 100), SensorEvent::new(2, "19.0", 102)]
        );
        feed.unsubscribe().unwrap();
    }

    #[test]
    fn test_line_feed_single_subscription() {
        let mut feed = LineFeed::new(Cursor::new(String::new()));
        let (callback, _) = collector();

        feed.subscribe(Arc::clone(&callback)).unwrap();
        assert!(matches!(feed.subscribe(callback), Err(FeedError::AlreadySubscribed)));
        feed.unsubscribe().unwrap();
        assert!(matches!(feed.unsubscribe(), Err(FeedError::NotSubscribed)));
    }

    #[test]
    fn test_channel_feed_delivers_queued_and_live_events() {
        let mut feed = ChannelFeed::new();
        let tx = feed.sender();
        tx.send(SensorEvent::new(1, "1.0", 1)).unwrap();

        let (callback, seen) = collector();
        feed.subscribe(callback).unwrap();
        tx.send(SensorEvent::new(2, "2.0", 2)).unwrap();
        wait_for(&seen, 2);

        feed.unsubscribe().unwrap();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_channel_feed_stops_after_unsubscribe() {
        let mut feed = ChannelFeed::new();
        let tx = feed.sender();
        let (callback, seen) = collector();

        feed.subscribe(callback).unwrap();
        feed.unsubscribe().unwrap();

        // The dispatcher is gone, so the send may report a disconnect.
        let _ = tx.send(SensorEvent::new(1, "1.0", 1));
        std::thread::sleep(CHANNEL_POLL * 2);
        assert!(seen.lock().is_empty());
    }
}
