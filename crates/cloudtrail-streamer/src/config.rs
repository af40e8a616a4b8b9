// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Hard per-call item ceiling of the Kinesis `PutRecords` API.
pub const MAX_BATCH_SIZE: usize = 500;
pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;
pub const DEFAULT_GCP_CREDENTIALS_PATH: &str = "./gcp_credentials.json";
pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";
pub const DEFAULT_LOGGING_ENDPOINT: &str = "https://logging.googleapis.com";

/// Shape of the payload the function is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// S3 object-created notification.
    S3,
    /// SNS notification wrapping an S3 object-created notification.
    Sns,
}

impl FromStr for EventType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S3" => Ok(EventType::S3),
            "SNS" => Ok(EventType::Sns),
            other => Err(ConfigError::Invalid {
                var: "CT_EVENT_TYPE",
                value: other.to_string(),
                reason: "must be either 'S3' or 'SNS'".to_string(),
            }),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::S3 => write!(f, "S3"),
            EventType::Sns => write!(f, "SNS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinesisConfig {
    pub stream: String,
    pub region: String,
    /// Number of records in a batched put to the stream, 1..=500
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpConfig {
    pub project_id: String,
    pub topic_id: Option<String>,
    pub stackdriver_name: Option<String>,
    pub credentials_path: PathBuf,
    pub pubsub_endpoint: String,
    pub logging_endpoint: String,
}

/// Configuration for the streamer, built once at startup and handed to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub event_type: EventType,
    /// Optional role to assume for S3 operations
    pub s3_role_arn: Option<String>,
    /// Raw `src:eventName,...` exclusion list
    pub event_filters: Option<String>,
    pub kinesis: Option<KinesisConfig>,
    pub gcp: Option<GcpConfig>,
    pub https_proxy: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_type: EventType::S3,
            s3_role_arn: None,
            event_filters: None,
            kinesis: None,
            gcp: None,
            https_proxy: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from `CT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let event_type = match non_empty_var("CT_EVENT_TYPE") {
            Some(value) => value.parse()?,
            None => EventType::S3,
        };

        let kinesis = match non_empty_var("CT_KINESIS_STREAM") {
            Some(stream) => {
                let region = non_empty_var("CT_KINESIS_REGION")
                    .ok_or(ConfigError::Missing("CT_KINESIS_REGION"))?;
                let batch_size = match non_empty_var("CT_KINESIS_BATCH_SIZE") {
                    Some(value) => parse_batch_size(&value)?,
                    None => DEFAULT_BATCH_SIZE,
                };
                Some(KinesisConfig {
                    stream,
                    region,
                    batch_size,
                })
            }
            None => None,
        };

        let topic_id = non_empty_var("CT_TOPIC_ID");
        let stackdriver_name = non_empty_var("CT_STACKDRIVER_NAME");
        let gcp = if topic_id.is_some() || stackdriver_name.is_some() {
            Some(GcpConfig {
                project_id: non_empty_var("CT_PROJECT_ID")
                    .ok_or(ConfigError::Missing("CT_PROJECT_ID"))?,
                topic_id,
                stackdriver_name,
                credentials_path: non_empty_var("CT_GCP_CREDENTIALS_PATH")
                    .unwrap_or_else(|| DEFAULT_GCP_CREDENTIALS_PATH.to_string())
                    .into(),
                pubsub_endpoint: non_empty_var("CT_PUBSUB_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_PUBSUB_ENDPOINT.to_string()),
                logging_endpoint: non_empty_var("CT_LOGGING_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_LOGGING_ENDPOINT.to_string()),
            })
        } else {
            None
        };

        let config = Self {
            event_type,
            s3_role_arn: non_empty_var("CT_S3_ROLE_ARN"),
            event_filters: non_empty_var("CT_EVENT_FILTERS"),
            kinesis,
            gcp,
            https_proxy: non_empty_var("HTTPS_PROXY"),
            log_level: log_level_from_env(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_gcp_sink = self
            .gcp
            .as_ref()
            .is_some_and(|gcp| gcp.topic_id.is_some() || gcp.stackdriver_name.is_some());
        if self.kinesis.is_none() && !has_gcp_sink {
            return Err(ConfigError::NoSinks);
        }

        if let Some(kinesis) = &self.kinesis {
            if kinesis.region.trim().is_empty() {
                return Err(ConfigError::Missing("CT_KINESIS_REGION"));
            }
            if kinesis.batch_size == 0 || kinesis.batch_size > MAX_BATCH_SIZE {
                return Err(batch_size_error(&kinesis.batch_size.to_string()));
            }
        }

        if let Some(gcp) = &self.gcp {
            if gcp.project_id.trim().is_empty() {
                return Err(ConfigError::Missing("CT_PROJECT_ID"));
            }
        }

        Ok(())
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.kinesis.as_ref().map(|k| k.stream.as_str())
    }
}

/// `CT_LOG_LEVEL` if set, otherwise `debug` when `CT_DEBUG_LOGGING=1`, otherwise `info`.
pub fn log_level_from_env() -> String {
    if let Some(level) = non_empty_var("CT_LOG_LEVEL") {
        return level.to_lowercase();
    }
    if env::var("CT_DEBUG_LOGGING").is_ok_and(|v| v == "1") {
        "debug".to_string()
    } else {
        "info".to_string()
    }
}

fn parse_batch_size(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(size) if (1..=MAX_BATCH_SIZE).contains(&size) => Ok(size),
        _ => Err(batch_size_error(value)),
    }
}

fn batch_size_error(value: &str) -> ConfigError {
    ConfigError::Invalid {
        var: "CT_KINESIS_BATCH_SIZE",
        value: value.to_string(),
        reason: format!("must be set to a value in between 1 and {MAX_BATCH_SIZE}"),
    }
}

// Empty values are treated the same as unset ones.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
