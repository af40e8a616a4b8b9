// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the streaming pipeline.

use reqwest::StatusCode;

/// Invalid or incomplete configuration, detected once at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is set to an invalid value, {value}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("At least one of CT_KINESIS_STREAM, CT_TOPIC_ID, or CT_STACKDRIVER_NAME must be set")]
    NoSinks,

    #[error("Error loading GCP credentials from {path}: {message}")]
    Credentials { path: String, message: String },
}

/// The object named by a notification could not be retrieved.
#[derive(Debug, thiserror::Error)]
#[error("Error getting s3://{bucket}/{key} ({region}): {message}")]
pub struct FetchError {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Error unzipping cloudtrail json file: {0}")]
    Gzip(#[source] std::io::Error),
}

/// Malformed JSON, either in a log object or in a notification envelope.
#[derive(Debug, thiserror::Error)]
#[error("Error parsing {context}: {source}")]
pub struct ParseError {
    pub context: &'static str,
    #[source]
    pub source: serde_json::Error,
}

impl ParseError {
    pub fn new(context: &'static str, source: serde_json::Error) -> Self {
        Self { context, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("Batch of {0} records exceeds the PutRecords limit of 500")]
    BatchTooLarge(usize),

    #[error("Error building PutRecords request: {0}")]
    Request(String),

    #[error("Error pushing {count} records to kinesis: {message}")]
    Delivery { count: usize, message: String },

    #[error("Batching worker terminated abnormally: {0}")]
    Worker(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to obtain access token: {0}")]
    Auth(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Background publish task failed: {0}")]
    Task(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{0} sink is not running")]
    NotRunning(&'static str),

    #[error(transparent)]
    Flush(#[from] FlushError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// The single error surfaced for a failed invocation.
#[derive(Debug, thiserror::Error)]
pub enum StreamerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Missing("CT_KINESIS_REGION");
        assert_eq!(error.to_string(), "CT_KINESIS_REGION must be set");

        let error = ConfigError::Invalid {
            var: "CT_EVENT_TYPE",
            value: "SQS".to_string(),
            reason: "must be either 'S3' or 'SNS'".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "CT_EVENT_TYPE is set to an invalid value, SQS: must be either 'S3' or 'SNS'"
        );
    }

    #[test]
    fn test_sink_error_is_transparent() {
        let error = SinkError::from(FlushError::Delivery {
            count: 3,
            message: "throttled".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "Error pushing 3 records to kinesis: throttled"
        );

        let error = StreamerError::from(error);
        assert!(matches!(
            error,
            StreamerError::Sink(SinkError::Flush(FlushError::Delivery { count: 3, .. }))
        ));
    }

    #[test]
    fn test_parse_error_keeps_context() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ParseError::new("notification message", source);
        assert!(error.to_string().starts_with("Error parsing notification message: "));
    }
}
