// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Concrete clients behind the sinks: Kinesis, Pub/Sub and Cloud Logging.
//!
//! Clients are created once per process and shared by the sinks of every cycle.

use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::errors::ConfigError;
use crate::http::get_client;
use crate::sinks::batching::{BatchingSink, BulkClient};
use crate::sinks::immediate::{ImmediateSink, StreamClient};
use crate::sinks::log::{LogClient, LogSink};
use crate::sinks::Sink;
use crate::streamer::SinkFactory;

pub mod bundler;
pub mod cloud_logging;
pub mod gcp;
pub mod kinesis;
pub mod pubsub;

use cloud_logging::CloudLoggingWriter;
use gcp::{GcpTransport, ServiceAccountToken};
use kinesis::KinesisClient;
use pubsub::PubSubPublisher;

/// Builds fresh sinks over long-lived provider clients.
#[derive(Clone, Default)]
pub struct ProviderSinkFactory {
    bulk: Option<(Arc<dyn BulkClient>, usize)>,
    stream: Option<Arc<dyn StreamClient>>,
    log: Option<Arc<dyn LogClient>>,
}

impl ProviderSinkFactory {
    /// Creates a client for every sink enabled in `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut factory = Self::default();

        if let Some(kinesis) = &config.kinesis {
            debug!("Using kinesis stream {} in {}", kinesis.stream, kinesis.region);
            let client = KinesisClient::from_config(kinesis).await;
            factory = factory.with_bulk_client(Arc::new(client), kinesis.batch_size);
        }

        if let Some(gcp) = &config.gcp {
            let tokens = ServiceAccountToken::from_file(&gcp.credentials_path)?;
            let transport = GcpTransport::new(get_client(config), Arc::new(tokens));

            if let Some(topic_id) = &gcp.topic_id {
                debug!("Using pubsub topic {topic_id} in project {}", gcp.project_id);
                factory = factory.with_stream_client(Arc::new(PubSubPublisher::new(
                    transport.clone(),
                    &gcp.pubsub_endpoint,
                    &gcp.project_id,
                    topic_id,
                )));
            }
            if let Some(name) = &gcp.stackdriver_name {
                debug!("Using stackdriver log {name} in project {}", gcp.project_id);
                factory = factory.with_log_client(Arc::new(CloudLoggingWriter::new(
                    transport,
                    &gcp.logging_endpoint,
                    &gcp.project_id,
                    name,
                )));
            }
        }

        Ok(factory)
    }

    #[must_use]
    pub fn with_bulk_client(mut self, client: Arc<dyn BulkClient>, batch_size: usize) -> Self {
        self.bulk = Some((client, batch_size));
        self
    }

    #[must_use]
    pub fn with_stream_client(mut self, client: Arc<dyn StreamClient>) -> Self {
        self.stream = Some(client);
        self
    }

    #[must_use]
    pub fn with_log_client(mut self, client: Arc<dyn LogClient>) -> Self {
        self.log = Some(client);
        self
    }
}

impl SinkFactory for ProviderSinkFactory {
    fn build_sinks(&self) -> Vec<Box<dyn Sink>> {
        let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(3);
        if let Some((client, batch_size)) = &self.bulk {
            sinks.push(Box::new(BatchingSink::new(Arc::clone(client), *batch_size)));
        }
        if let Some(client) = &self.stream {
            sinks.push(Box::new(ImmediateSink::new(Arc::clone(client))));
        }
        if let Some(client) = &self.log {
            sinks.push(Box::new(LogSink::new(Arc::clone(client))));
        }
        sinks
    }
}
