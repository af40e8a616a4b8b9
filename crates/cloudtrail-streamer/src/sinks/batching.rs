// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded-batch delivery through a background worker.
//!
//! The sink is split in two halves that only talk through channels:
//!
//! ```text
//!    ┌──────────────┐   unbounded queue    ┌──────────────┐   put_batch   ┌────────────┐
//!    │ BatchingSink │ ───────────────────> │ BatchWorker  │ ────────────> │ BulkClient │
//!    │  (producer)  │ ── drain signal ───> │ (owns buffer)│               └────────────┘
//!    └──────────────┘                      └──────────────┘
//! ```
//!
//! The worker is the only code touching the buffer and the bulk client. It flushes exactly
//! when the buffer reaches the batch size, and once more on drain if anything is left.
//!
//! A failed bulk call is terminal: the worker stops, the failed batch is dropped, and the
//! error is returned by [`BatchingSink::close`](Sink::close).

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::MAX_BATCH_SIZE;
use crate::errors::{FlushError, SinkError};
use crate::sinks::{Sink, SinkKind, SinkState};

const SINK_NAME: &str = "kinesis";

/// Bulk delivery endpoint used by the worker.
#[async_trait]
pub trait BulkClient: Send + Sync {
    /// Delivers `items` in one call. `items` never holds more than 500 entries.
    async fn put_batch(&self, items: &[Bytes]) -> Result<(), FlushError>;
}

pub struct BatchingSink {
    state: SinkState,
    batch_size: usize,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    drain_token: CancellationToken,
    /// Present until the sink is started.
    worker: Option<BatchWorker>,
    handle: Option<JoinHandle<Result<(), FlushError>>>,
}

impl BatchingSink {
    /// Creates an idle sink. `batch_size` is clamped to `1..=500`.
    #[must_use]
    pub fn new(client: Arc<dyn BulkClient>, batch_size: usize) -> Self {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        let (tx, rx) = mpsc::unbounded_channel();
        let drain_token = CancellationToken::new();

        let worker = BatchWorker {
            rx,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            client,
            drain_token: drain_token.clone(),
        };

        Self {
            state: SinkState::Idle,
            batch_size,
            tx: Some(tx),
            drain_token,
            worker: Some(worker),
            handle: None,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[async_trait]
impl Sink for BatchingSink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Batching
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn start(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.handle = Some(tokio::spawn(worker.run()));
            self.state = SinkState::Running;
        }
    }

    async fn send(&self, record: Bytes) -> Result<(), SinkError> {
        if self.state != SinkState::Running {
            return Err(SinkError::NotRunning(SINK_NAME));
        }
        let Some(tx) = &self.tx else {
            return Err(SinkError::NotRunning(SINK_NAME));
        };
        // Fails only once the worker has stopped after a flush error
        tx.send(record)
            .map_err(|_| SinkError::NotRunning(SINK_NAME))
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        match self.state {
            SinkState::Closed => return Ok(()),
            SinkState::Idle => {
                self.worker = None;
                self.tx = None;
                self.state = SinkState::Closed;
                return Ok(());
            }
            SinkState::Running | SinkState::Draining => {}
        }

        debug!("KINESIS | Draining batching worker");
        self.state = SinkState::Draining;
        self.tx = None;
        self.drain_token.cancel();

        let result = match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(FlushError::Worker(e.to_string())),
            },
            None => Ok(()),
        };

        self.state = SinkState::Closed;
        debug!("KINESIS | Batching worker closed");
        result.map_err(SinkError::from)
    }
}

struct BatchWorker {
    rx: mpsc::UnboundedReceiver<Bytes>,
    buffer: Vec<Bytes>,
    batch_size: usize,
    client: Arc<dyn BulkClient>,
    drain_token: CancellationToken,
}

impl BatchWorker {
    async fn run(mut self) -> Result<(), FlushError> {
        debug!("KINESIS | Batching worker started");

        loop {
            tokio::select! {
                record = self.rx.recv() => match record {
                    Some(record) => self.push(record).await?,
                    // the producer half is gone
                    None => break,
                },
                () = self.drain_token.cancelled() => {
                    debug!("KINESIS | Received drain signal, consuming queued records");
                    while let Ok(record) = self.rx.try_recv() {
                        self.push(record).await?;
                    }
                    break;
                }
            }
        }

        if !self.buffer.is_empty() {
            self.flush().await?;
        }

        debug!("KINESIS | Batching worker stopped");
        Ok(())
    }

    async fn push(&mut self, record: Bytes) -> Result<(), FlushError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), FlushError> {
        let batch = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        info!("KINESIS | PutRecords to kinesis with a len of {}", batch.len());
        self.client.put_batch(&batch).await.map_err(|e| {
            error!("KINESIS | {e}, dropping {} records", batch.len());
            e
        })
    }
}
