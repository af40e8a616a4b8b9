// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-record publishing to a provider-managed topic.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::{PublishError, SinkError};
use crate::sinks::{Sink, SinkKind, SinkState};

const SINK_NAME: &str = "pubsub";

/// Topic publisher. Bundling and flow control are the client's business.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Queues one message for publishing.
    async fn publish(&self, message: Bytes) -> Result<(), PublishError>;

    /// Publishes anything still queued and waits for every outstanding publish.
    async fn stop(&self) -> Result<(), PublishError>;
}

pub struct ImmediateSink {
    state: SinkState,
    client: Arc<dyn StreamClient>,
}

impl ImmediateSink {
    #[must_use]
    pub fn new(client: Arc<dyn StreamClient>) -> Self {
        Self {
            state: SinkState::Idle,
            client,
        }
    }
}

#[async_trait]
impl Sink for ImmediateSink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Immediate
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn start(&mut self) {
        if self.state == SinkState::Idle {
            self.state = SinkState::Running;
        }
    }

    async fn send(&self, record: Bytes) -> Result<(), SinkError> {
        if self.state != SinkState::Running {
            return Err(SinkError::NotRunning(SINK_NAME));
        }
        self.client.publish(record).await?;
        Ok(())
    }

    /// Stops the publisher. A failed stop is logged and the sink still closes.
    async fn close(&mut self) -> Result<(), SinkError> {
        if self.state == SinkState::Running {
            self.state = SinkState::Draining;
            debug!("PUBSUB | Stopping topic");
            if let Err(e) = self.client.stop().await {
                error!("PUBSUB | Error stopping topic: {e}");
            }
        }
        self.state = SinkState::Closed;
        Ok(())
    }
}
