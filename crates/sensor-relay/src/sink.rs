// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch sinks: where encoded batches are posted.
//!
//! Delivery is best effort. A failed post is reported to the caller once
//! and the batch is gone; sinks never retry or queue.

use crate::config::InfluxDbConfig;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use thiserror::Error;

/// Sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("POST to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("POST to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Accepts encoded batches.
pub trait BatchSink: Send {
    /// Post one encoded batch.
    fn post(&self, body: &str) -> Result<(), SinkError>;
}

impl<S: BatchSink + ?Sized> BatchSink for Box<S> {
    fn post(&self, body: &str) -> Result<(), SinkError> {
        (**self).post(body)
    }
}

impl<S: BatchSink + Sync + ?Sized> BatchSink for Arc<S> {
    fn post(&self, body: &str) -> Result<(), SinkError> {
        (**self).post(body)
    }
}

/// Posts batches to an InfluxDB 1.x `/write` endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    url: String,
    content_type: String,
}

impl HttpSink {
    /// Build a sink from endpoint settings.
    pub fn new(config: &InfluxDbConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(SinkError::Client)?;

        Ok(Self::with_client(client, config))
    }

    /// Use a preconfigured client (proxy, TLS roots); the client's own
    /// timeout applies instead of `config.timeout_ms`.
    pub fn with_client(client: Client, config: &InfluxDbConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            content_type: config.content_type.clone(),
        }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BatchSink for HttpSink {
    fn post(&self, body: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, &self.content_type)
            .body(body.to_owned())
            .send()
            .map_err(|source| SinkError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recording(Mutex<Vec<String>>);

    impl BatchSink for Recording {
        fn post(&self, body: &str) -> Result<(), SinkError> {
            self.0.lock().push(body.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_boxed_and_shared_sinks_forward() {
        let shared = Arc::new(Recording(Mutex::new(Vec::new())));
        shared.post("a").unwrap();

        let boxed: Box<dyn BatchSink> = Box::new(Recording(Mutex::new(Vec::new())));
        boxed.post("b").unwrap();

        let arc_sink = Arc::clone(&shared);
        arc_sink.post("c").unwrap();
        assert_eq!(*shared.0.lock(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_http_sink_keeps_url() {
        let sink = HttpSink::new(&InfluxDbConfig::default()).unwrap();
        assert_eq!(sink.url(), crate::config::DEFAULT_URL);
    }

    #[test]
    fn test_status_error_message() {
        let err = SinkError::Status {
            url: "http://db/write".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "POST to http://db/write returned status 404");
    }
}
