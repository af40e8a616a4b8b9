// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::errors::PublishError;
use crate::providers::bundler::{Bundler, InFlight};
use crate::providers::gcp::GcpTransport;
use crate::sinks::log::LogClient;

/// Entries per `entries:write` request.
pub const ENTRY_COUNT_THRESHOLD: usize = 1000;

/// Entry payload bytes per `entries:write` request, under the 10 MB request limit.
pub const ENTRY_BYTE_THRESHOLD: usize = 1 << 23;

/// Writes entries to a Cloud Logging log through the REST API.
pub struct CloudLoggingWriter {
    transport: GcpTransport,
    url: String,
    log_name: String,
    bundler: Bundler<Bytes>,
    in_flight: InFlight,
}

impl CloudLoggingWriter {
    #[must_use]
    pub fn new(transport: GcpTransport, endpoint: &str, project_id: &str, name: &str) -> Self {
        Self::with_thresholds(
            transport,
            endpoint,
            project_id,
            name,
            ENTRY_COUNT_THRESHOLD,
            ENTRY_BYTE_THRESHOLD,
        )
    }

    #[must_use]
    pub fn with_thresholds(
        transport: GcpTransport,
        endpoint: &str,
        project_id: &str,
        name: &str,
        count_threshold: usize,
        byte_threshold: usize,
    ) -> Self {
        Self {
            transport,
            url: format!("{}/v2/entries:write", endpoint.trim_end_matches('/')),
            log_name: format!("projects/{project_id}/logs/{name}"),
            bundler: Bundler::new(count_threshold, byte_threshold),
            in_flight: InFlight::default(),
        }
    }

    async fn dispatch(&self, bundle: Vec<Bytes>) {
        let transport = self.transport.clone();
        let url = self.url.clone();
        let body = write_request(&self.log_name, &bundle);
        self.in_flight
            .spawn(async move {
                debug!("STACKDRIVER | Writing {} entries", bundle.len());
                transport.post_json(&url, &body).await
            })
            .await;
    }
}

// Records are JSON objects and land as structured payloads; anything else is kept as text.
fn entry(payload: &[u8]) -> Value {
    match serde_json::from_slice::<Map<String, Value>>(payload) {
        Ok(fields) => json!({ "jsonPayload": fields }),
        Err(_) => json!({ "textPayload": String::from_utf8_lossy(payload) }),
    }
}

fn write_request(log_name: &str, entries: &[Bytes]) -> Value {
    let entries: Vec<Value> = entries.iter().map(|e| entry(e)).collect();
    json!({
        "logName": log_name,
        "resource": { "type": "global" },
        "entries": entries,
    })
}

#[async_trait]
impl LogClient for CloudLoggingWriter {
    async fn log(&self, entry: Bytes) -> Result<(), PublishError> {
        for bundle in self.bundler.add(entry) {
            self.dispatch(bundle).await;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), PublishError> {
        let remainder = self.bundler.take();
        if !remainder.is_empty() {
            self.dispatch(remainder).await;
        }
        self.in_flight.wait().await
    }
}
