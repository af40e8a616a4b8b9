// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error};

use crate::errors::{PublishError, SinkError};
use crate::sinks::{Sink, SinkKind, SinkState};

const SINK_NAME: &str = "stackdriver";

/// Writer for a centralized log store.
#[async_trait]
pub trait LogClient: Send + Sync {
    async fn log(&self, entry: Bytes) -> Result<(), PublishError>;

    /// Writes buffered entries and waits for outstanding writes.
    async fn flush(&self) -> Result<(), PublishError>;
}

/// Writes every record as one log entry; flush failures are only logged.
pub struct LogSink {
    state: SinkState,
    client: Arc<dyn LogClient>,
}

impl LogSink {
    #[must_use]
    pub fn new(client: Arc<dyn LogClient>) -> Self {
        Self {
            state: SinkState::Idle,
            client,
        }
    }
}

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Log
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
        self.client.log(record).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.state == SinkState::Running {
            self.state = SinkState::Draining;
            debug!("STACKDRIVER | Flushing logger");
            if let Err(e) = self.client.flush().await {
                error!("STACKDRIVER | Error flushing logger: {e}");
            }
        }
        self.state = SinkState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLogger {
        entries: Mutex<Vec<Bytes>>,
        flushed: Mutex<Vec<Bytes>>,
        fail_flush: bool,
    }

    #[async_trait]
    impl LogClient for FakeLogger {
        async fn log(&self, entry: Bytes) -> Result<(), PublishError> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        async fn flush(&self) -> Result<(), PublishError> {
            if self.fail_flush {
                return Err(PublishError::Status {
                    status: StatusCode::FORBIDDEN,
                    body: "permission denied".to_string(),
                });
            }
            let pending = std::mem::take(&mut *self.entries.lock().unwrap());
            self.flushed.lock().unwrap().extend(pending);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_close_flushes_entries() {
        let logger = Arc::new(FakeLogger::default());
        let mut sink = LogSink::new(Arc::clone(&logger) as Arc<dyn LogClient>);
        sink.start();
        sink.send(Bytes::from_static(b"{\"eventName\":\"GetObject\"}"))
            .await
            .unwrap();
        assert!(logger.flushed.lock().unwrap().is_empty());

        sink.close().await.unwrap();
        assert_eq!(logger.flushed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_failure_is_logged_only() {
        let logger = Arc::new(FakeLogger {
            fail_flush: true,
            ..Default::default()
        });
        let mut sink = LogSink::new(logger);
        sink.start();
        sink.send(Bytes::from_static(b"{}")).await.unwrap();
        assert!(sink.close().await.is_ok());
        assert_eq!(sink.state(), SinkState::Closed);
    }
}
