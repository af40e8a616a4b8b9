// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::config::Region;
use aws_sdk_kinesis::error::DisplayErrorContext;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::PutRecordsRequestEntry;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::{KinesisConfig, MAX_BATCH_SIZE};
use crate::errors::FlushError;
use crate::sinks::batching::BulkClient;

/// Every record goes to the same partition key.
pub const PARTITION_KEY: &str = "key";

/// `PutRecords` against a single stream.
pub struct KinesisClient {
    client: aws_sdk_kinesis::Client,
    stream: String,
}

impl KinesisClient {
    #[must_use]
    pub fn new(client: aws_sdk_kinesis::Client, stream: &str) -> Self {
        Self {
            client,
            stream: stream.to_string(),
        }
    }

    pub async fn from_config(config: &KinesisConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        Self::new(aws_sdk_kinesis::Client::new(&sdk_config), &config.stream)
    }
}

fn request_entries(items: &[Bytes]) -> Result<Vec<PutRecordsRequestEntry>, FlushError> {
    items
        .iter()
        .map(|item| {
            PutRecordsRequestEntry::builder()
                .data(Blob::new(item.to_vec()))
                .partition_key(PARTITION_KEY)
                .build()
                .map_err(|e| FlushError::Request(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl BulkClient for KinesisClient {
    async fn put_batch(&self, items: &[Bytes]) -> Result<(), FlushError> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(FlushError::BatchTooLarge(items.len()));
        }
        if items.is_empty() {
            return Ok(());
        }

        let output = self
            .client
            .put_records()
            .stream_name(&self.stream)
            .set_records(Some(request_entries(items)?))
            .send()
            .await
            .map_err(|e| FlushError::Delivery {
                count: items.len(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        match output.failed_record_count() {
            Some(failed) if failed > 0 => {
                warn!(
                    "KINESIS | PutRecords to {} reported {failed} of {} records failed",
                    self.stream,
                    items.len()
                );
            }
            _ => debug!("KINESIS | PutRecords to {} succeeded", self.stream),
        }
        Ok(())
    }
}
