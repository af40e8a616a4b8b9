// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use core::time::Duration;
use tracing::error;

use crate::config::Config;

/// Request timeout of the REST sinks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a reqwest client with optional proxy configuration and timeout.
/// Uses rustls TLS.
pub fn build_client(
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));
    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// Client shared by the REST sinks.
///
/// An unusable proxy setting is logged and the client falls back to a direct connection.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config.https_proxy.as_deref(), DEFAULT_TIMEOUT) {
        Ok(client) => client,
        Err(e) => {
            error!("Unable to parse proxy configuration: {e}, falling back to direct connection");
            build_client(None, DEFAULT_TIMEOUT).unwrap_or_else(|inner| {
                error!("Failed to build HTTP client without proxy: {inner}, using reqwest defaults");
                reqwest::Client::new()
            })
        }
    }
}
