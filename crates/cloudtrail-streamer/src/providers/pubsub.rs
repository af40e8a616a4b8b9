// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::PublishError;
use crate::providers::bundler::{Bundler, InFlight};
use crate::providers::gcp::GcpTransport;
use crate::sinks::immediate::StreamClient;

/// Messages per publish request.
pub const PUBLISH_COUNT_THRESHOLD: usize = 300;

/// Message payload bytes per publish request, before base64 encoding.
///
/// Keeps an encoded request well below the 10 MB Pub/Sub request limit.
pub const PUBLISH_BYTE_THRESHOLD: usize = 1_000_000;

/// Publishes messages to a Pub/Sub topic through the REST API.
///
/// Messages are bundled by count and size; every full bundle is published in the background. `stop` publishes
/// the partial bundle and waits for all outstanding publishes.
pub struct PubSubPublisher {
    transport: GcpTransport,
    url: String,
    bundler: Bundler<Bytes>,
    in_flight: InFlight,
}

impl PubSubPublisher {
    #[must_use]
    pub fn new(transport: GcpTransport, endpoint: &str, project_id: &str, topic_id: &str) -> Self {
        Self::with_thresholds(
            transport,
            endpoint,
            project_id,
            topic_id,
            PUBLISH_COUNT_THRESHOLD,
            PUBLISH_BYTE_THRESHOLD,
        )
    }

    #[must_use]
    pub fn with_thresholds(
        transport: GcpTransport,
        endpoint: &str,
        project_id: &str,
        topic_id: &str,
        count_threshold: usize,
        byte_threshold: usize,
    ) -> Self {
        Self {
            transport,
            url: format!(
                "{}/v1/projects/{project_id}/topics/{topic_id}:publish",
                endpoint.trim_end_matches('/')
            ),
            bundler: Bundler::new(count_threshold, byte_threshold),
            in_flight: InFlight::default(),
        }
    }

    async fn dispatch(&self, bundle: Vec<Bytes>) {
        let transport = self.transport.clone();
        let url = self.url.clone();
        self.in_flight
            .spawn(async move {
                debug!("PUBSUB | Publishing {} messages", bundle.len());
                transport.post_json(&url, &publish_request(&bundle)).await
            })
            .await;
    }
}

fn publish_request(messages: &[Bytes]) -> Value {
    let messages: Vec<Value> = messages
        .iter()
        .map(|data| json!({ "data": STANDARD.encode(data) }))
        .collect();
    json!({ "messages": messages })
}

#[async_trait]
impl StreamClient for PubSubPublisher {
    async fn publish(&self, message: Bytes) -> Result<(), PublishError> {
        for bundle in self.bundler.add(message) {
            self.dispatch(bundle).await;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), PublishError> {
        let remainder = self.bundler.take();
        if !remainder.is_empty() {
            self.dispatch(remainder).await;
        }
        self.in_flight.wait().await
    }
}
