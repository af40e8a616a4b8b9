// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Downstream destinations for forwarded records.
//!
//! Every destination implements [`Sink`]; the router fans each record out to the
//! configured sinks without knowing how any of them deliver.
//!
//! - [`batching::BatchingSink`]: background worker grouping records into bulk calls
//!   (Kinesis `PutRecords`), hard-failing on a delivery error.
//! - [`immediate::ImmediateSink`]: hands each record to a publisher client (Pub/Sub),
//!   best-effort.
//! - [`log::LogSink`]: hands each record to a log writer client (Cloud Logging),
//!   best-effort.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::SinkError;

pub mod batching;
pub mod immediate;
pub mod log;

/// Lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Constructed, not yet accepting records.
    Idle,
    Running,
    /// Shutdown requested, buffered records are being delivered.
    Draining,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Batching,
    Immediate,
    Log,
}

#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> SinkKind;

    fn state(&self) -> SinkState;

    /// Moves the sink from `Idle` to `Running`. Starting twice is a no-op.
    fn start(&mut self);

    /// Accepts one serialized record. Never waits for downstream acknowledgement.
    async fn send(&self, record: Bytes) -> Result<(), SinkError>;

    /// Delivers everything still buffered and releases the sink.
    async fn close(&mut self) -> Result<(), SinkError>;
}
