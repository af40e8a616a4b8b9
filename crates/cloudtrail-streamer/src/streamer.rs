// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The per-invocation pipeline.
//!
//! An invocation carries one or more object-created notifications. Each notification is
//! handled in its own cycle: fresh sinks are built and started, every object named by the
//! notification is fetched, decoded, filtered and routed, and the sinks are closed again.
//! Sinks are closed even when the cycle fails part way through.

use serde_json::Value;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{Config, EventType};
use crate::decoder::decode;
use crate::errors::StreamerError;
use crate::fetcher::ObjectFetcher;
use crate::filter::FilterEngine;
use crate::router::SinkRouter;
use crate::sinks::Sink;
use crate::trigger::{unwrap_envelope, ObjectCreatedEvent, ObjectRef};

/// Produces the sinks for one cycle.
pub trait SinkFactory: Send + Sync {
    fn build_sinks(&self) -> Vec<Box<dyn Sink>>;
}

/// Record counts over one or more objects.
///
/// `forwarded` counts records at least one sink accepted; `rejected` counts records that
/// passed the filters but no sink accepted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub objects: usize,
    pub total: usize,
    pub dropped: usize,
    pub forwarded: usize,
    pub rejected: usize,
}

impl AddAssign for StreamSummary {
    fn add_assign(&mut self, other: Self) {
        self.objects += other.objects;
        self.total += other.total;
        self.dropped += other.dropped;
        self.forwarded += other.forwarded;
        self.rejected += other.rejected;
    }
}

pub struct Streamer {
    event_type: EventType,
    fetcher: Arc<dyn ObjectFetcher>,
    filters: FilterEngine,
    sinks: Arc<dyn SinkFactory>,
}

impl Streamer {
    #[must_use]
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn ObjectFetcher>,
        filters: FilterEngine,
        sinks: Arc<dyn SinkFactory>,
    ) -> Self {
        Self {
            event_type: config.event_type,
            fetcher,
            filters,
            sinks,
        }
    }

    /// Handles one invocation payload.
    ///
    /// Stops at the first failing cycle; notifications after it are not processed.
    pub async fn handle(&self, payload: Value) -> Result<StreamSummary, StreamerError> {
        let events = unwrap_envelope(self.event_type, payload)?;
        debug!("Received {} {} notifications", events.len(), self.event_type);

        let mut summary = StreamSummary::default();
        for event in &events {
            summary += self.run_cycle(event).await?;
        }
        Ok(summary)
    }

    /// Streams every object of one notification through a fresh set of sinks.
    ///
    /// A processing error takes precedence over an error from closing the sinks.
    pub async fn run_cycle(&self, event: &ObjectCreatedEvent) -> Result<StreamSummary, StreamerError> {
        let router = SinkRouter::start(self.sinks.build_sinks());
        let mut summary = StreamSummary::default();

        let processed = self.stream_objects(&router, event, &mut summary).await;
        let closed = router.close().await;

        processed?;
        closed?;
        Ok(summary)
    }

    async fn stream_objects(
        &self,
        router: &SinkRouter,
        event: &ObjectCreatedEvent,
        summary: &mut StreamSummary,
    ) -> Result<(), StreamerError> {
        for object in event.objects() {
            *summary += self.stream_object(router, &object).await?;
        }
        Ok(())
    }

    async fn stream_object(
        &self,
        router: &SinkRouter,
        object: &ObjectRef,
    ) -> Result<StreamSummary, StreamerError> {
        let raw = self
            .fetcher
            .get(&object.bucket, &object.key, &object.region)
            .await?;
        let records = decode(raw)?;

        let mut stats = StreamSummary {
            objects: 1,
            total: records.len(),
            ..Default::default()
        };
        for record in &records {
            if self.filters.is_excluded(record) {
                stats.dropped += 1;
                continue;
            }
            if router.route(record).await > 0 {
                stats.forwarded += 1;
            } else {
                stats.rejected += 1;
            }
        }

        info!(
            "Streamed s3://{}/{}: {} records, {} dropped, {} forwarded, {} rejected",
            object.bucket,
            object.key,
            stats.total,
            stats.dropped,
            stats.forwarded,
            stats.rejected
        );
        Ok(stats)
    }
}
