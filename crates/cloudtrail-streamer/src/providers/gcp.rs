// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Authenticated JSON requests against Google Cloud REST APIs.

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{ConfigError, PublishError};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Source of OAuth2 bearer tokens.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, PublishError>;
}

/// A fixed token, for emulators and tests.
#[derive(Clone, Debug)]
pub struct StaticToken(String);

impl StaticToken {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, PublishError> {
        Ok(self.0.clone())
    }
}

/// Tokens minted from a service account key. Tokens are cached until close to expiry.
pub struct ServiceAccountToken {
    account: CustomServiceAccount,
}

impl ServiceAccountToken {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Credentials {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let account = CustomServiceAccount::from_json(&json).map_err(|e| {
            ConfigError::Credentials {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self { account })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountToken {
    async fn access_token(&self) -> Result<String, PublishError> {
        let token = self
            .account
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| PublishError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

/// HTTP client paired with a token source. Cheap to clone.
#[derive(Clone)]
pub struct GcpTransport {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GcpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self { client, tokens }
    }

    /// POSTs `body`, failing on any non-2xx response.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<(), PublishError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Status { status, body })
    }
}
