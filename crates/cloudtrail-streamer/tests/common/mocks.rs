// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory stand-ins for the object store and the provider clients

use bytes::Bytes;
use cloudtrail_streamer::{
    decoder::RawObject,
    errors::{FetchError, FlushError, PublishError},
    fetcher::ObjectFetcher,
    sinks::{batching::BulkClient, immediate::StreamClient, log::LogClient},
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Object store keyed by `bucket/key`
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, RawObject>>,
    pub requests: Mutex<Vec<(String, String, String)>>,
}

impl MemoryObjectStore {
    pub fn put(&self, bucket: &str, key: &str, object: RawObject) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{key}"), object);
    }
}

#[async_trait::async_trait]
impl ObjectFetcher for MemoryObjectStore {
    async fn get(&self, bucket: &str, key: &str, region: &str) -> Result<RawObject, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), region.to_string()));
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{key}"))
            .cloned()
            .ok_or_else(|| FetchError {
                bucket: bucket.to_string(),
                key: key.to_string(),
                region: region.to_string(),
                message: "NoSuchKey: The specified key does not exist.".to_string(),
            })
    }
}

/// Bulk client recording every batch it is handed
#[derive(Default)]
pub struct RecordingStream {
    pub batches: Mutex<Vec<Vec<Bytes>>>,
    /// Fail every call once this many calls have succeeded
    pub fail_after: Option<usize>,
}

impl RecordingStream {
    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            ..Default::default()
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn records(&self) -> Vec<Bytes> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait::async_trait]
impl BulkClient for RecordingStream {
    async fn put_batch(&self, items: &[Bytes]) -> Result<(), FlushError> {
        let mut batches = self.batches.lock().unwrap();
        if self.fail_after.is_some_and(|n| batches.len() >= n) {
            return Err(FlushError::Delivery {
                count: items.len(),
                message: "ResourceNotFoundException: Stream audit not found".to_string(),
            });
        }
        batches.push(items.to_vec());
        Ok(())
    }
}

/// Topic publisher that either records or rejects every message
#[derive(Default)]
pub struct RecordingTopic {
    pub published: Mutex<Vec<Bytes>>,
    pub stopped: Mutex<usize>,
    pub reject: bool,
}

#[async_trait::async_trait]
impl StreamClient for RecordingTopic {
    async fn publish(&self, message: Bytes) -> Result<(), PublishError> {
        if self.reject {
            return Err(PublishError::Auth("token expired".to_string()));
        }
        self.published.lock().unwrap().push(message);
        Ok(())
    }

    async fn stop(&self) -> Result<(), PublishError> {
        *self.stopped.lock().unwrap() += 1;
        Ok(())
    }
}

/// Log writer whose flush always fails
#[derive(Default)]
pub struct BrokenLog {
    pub entries: Mutex<Vec<Bytes>>,
}

#[async_trait::async_trait]
impl LogClient for BrokenLog {
    async fn log(&self, entry: Bytes) -> Result<(), PublishError> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    async fn flush(&self) -> Result<(), PublishError> {
        Err(PublishError::Task("writer task panicked".to_string()))
    }
}
