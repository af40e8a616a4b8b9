// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, error};

use crate::config::Config;
use crate::decoder::RawObject;
use crate::errors::FetchError;

const ASSUME_ROLE_SESSION_NAME: &str = "cloudtrail-streamer";

/// Retrieves a log object together with its declared content type.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn get(&self, bucket: &str, key: &str, region: &str) -> Result<RawObject, FetchError>;
}

/// Reads objects from S3, in the region named by each notification record.
pub struct S3Fetcher {
    base: SdkConfig,
    /// Assumed-role credentials, used instead of the base credentials when present.
    credentials: Option<SharedCredentialsProvider>,
}

impl S3Fetcher {
    #[must_use]
    pub fn new(base: SdkConfig, credentials: Option<SharedCredentialsProvider>) -> Self {
        Self { base, credentials }
    }

    /// Loads the ambient AWS configuration, assuming `CT_S3_ROLE_ARN` when set.
    pub async fn from_config(config: &Config) -> Self {
        let base = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let credentials = match &config.s3_role_arn {
            Some(role_arn) => {
                debug!("Assuming role {role_arn} for S3 operations");
                let provider = AssumeRoleProvider::builder(role_arn)
                    .session_name(ASSUME_ROLE_SESSION_NAME)
                    .configure(&base)
                    .build()
                    .await;
                Some(SharedCredentialsProvider::new(provider))
            }
            None => None,
        };
        Self::new(base, credentials)
    }

    fn client(&self, region: &str) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::config::Builder::from(&self.base);
        if !region.is_empty() {
            builder = builder.region(Region::new(region.to_string()));
        }
        if let Some(credentials) = &self.credentials {
            builder = builder.credentials_provider(credentials.clone());
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }
}

#[async_trait]
impl ObjectFetcher for S3Fetcher {
    async fn get(&self, bucket: &str, key: &str, region: &str) -> Result<RawObject, FetchError> {
        let fetch_error = |message: String| {
            let e = FetchError {
                bucket: bucket.to_string(),
                key: key.to_string(),
                region: region.to_string(),
                message,
            };
            error!("{e}");
            e
        };

        debug!("Getting s3://{bucket}/{key} in {region}");
        let output = self
            .client(region)
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| fetch_error(DisplayErrorContext(&e).to_string()))?;

        let content_type = output.content_type().map(str::to_string);
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .into_bytes();

        debug!(
            "Got {} bytes with content type {}",
            body.len(),
            content_type.as_deref().unwrap_or("<none>")
        );
        Ok(RawObject {
            body,
            content_type,
        })
    }
}
