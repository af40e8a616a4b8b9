// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fan-out of forwarded records to every configured sink.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use crate::errors::SinkError;
use crate::record::Record;
use crate::sinks::{Sink, SinkKind};

fn order(kind: SinkKind) -> u8 {
    match kind {
        SinkKind::Batching => 0,
        SinkKind::Immediate => 1,
        SinkKind::Log => 2,
    }
}

/// Owns the sinks of one processing cycle.
///
/// Sinks are kept in a fixed order (batching, immediate, log) regardless of the order they
/// were handed in. A failure on one sink never keeps a record from the sinks after it.
pub struct SinkRouter {
    sinks: Vec<Box<dyn Sink>>,
    // Set once a sink has refused a record because it stopped running.
    stopped: Vec<AtomicBool>,
}

impl SinkRouter {
    /// Takes ownership of `sinks` and starts each of them.
    #[must_use]
    pub fn start(mut sinks: Vec<Box<dyn Sink>>) -> Self {
        sinks.sort_by_key(|sink| order(sink.kind()));
        for sink in &mut sinks {
            sink.start();
            debug!("Started {} sink", sink.name());
        }
        let stopped = sinks.iter().map(|_| AtomicBool::new(false)).collect();
        Self { sinks, stopped }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sinks.iter().map(|sink| sink.name())
    }

    /// Serializes `record` once and sends it to every sink.
    ///
    /// Returns the number of sinks that accepted the record. A record that cannot be
    /// serialized is logged and reaches no sink.
    pub async fn route(&self, record: &Record) -> usize {
        match record.to_bytes() {
            Ok(bytes) => self.send(bytes).await,
            Err(e) => {
                error!("Error marshalling record: {e}");
                0
            }
        }
    }

    /// Sends `bytes` to every sink and returns how many accepted it.
    ///
    /// A sink that is no longer running is reported once; the records it refuses after
    /// that are only logged at debug level.
    pub async fn send(&self, bytes: Bytes) -> usize {
        let mut accepted = 0;
        for (sink, stopped) in self.sinks.iter().zip(&self.stopped) {
            match sink.send(bytes.clone()).await {
                Ok(()) => accepted += 1,
                Err(e @ SinkError::NotRunning(_)) => {
                    if stopped.swap(true, Ordering::Relaxed) {
                        debug!("Dropped record for {}: {e}", sink.name());
                    } else {
                        error!(
                            "Error sending record to {}: {e}, dropping its records until the cycle ends",
                            sink.name()
                        );
                    }
                }
                Err(e) => error!("Error sending record to {}: {e}", sink.name()),
            }
        }
        accepted
    }

    /// Closes every sink, batching sinks first.
    ///
    /// The batching worker has terminated before any other sink is closed. Every sink is
    /// closed even if an earlier one fails; the first failure is returned.
    pub async fn close(mut self) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            debug!("Closing {} sink", sink.name());
            if let Err(e) = sink.close().await {
                error!("Error closing {} sink: {e}", sink.name());
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
