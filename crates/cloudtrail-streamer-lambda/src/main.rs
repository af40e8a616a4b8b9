// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use cloudtrail_streamer::{
    config::{self, Config},
    fetcher::S3Fetcher,
    filter::FilterEngine,
    logger::Formatter,
    providers::ProviderSinkFactory,
    streamer::Streamer,
};

#[tokio::main]
pub async fn main() -> Result<(), Error> {
    let log_level = config::log_level_from_env();
    let env_filter = format!("h2=off,hyper=off,rustls=off,aws_smithy_runtime=off,{log_level}");

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter)?)
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error loading config: {e}");
            return Err(e.into());
        }
    };

    let fetcher = S3Fetcher::from_config(&config).await;
    let filters = FilterEngine::new(&config);
    if !filters.is_empty() {
        debug!("Excluding {} event filters", filters.rules().len());
    }
    let sinks = match ProviderSinkFactory::from_config(&config).await {
        Ok(factory) => factory,
        Err(e) => {
            error!("Error creating sink clients: {e}");
            return Err(e.into());
        }
    };

    let streamer = Arc::new(Streamer::new(
        &config,
        Arc::new(fetcher),
        filters,
        Arc::new(sinks),
    ));

    info!("Starting CloudTrail streamer for {} events", config.event_type);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let streamer = Arc::clone(&streamer);
        async move {
            let (payload, context) = event.into_parts();
            debug!("Handling invocation {}", context.request_id);
            match streamer.handle(payload).await {
                Ok(summary) => {
                    info!(
                        "Forwarded {} of {} records from {} objects, {} rejected by every sink",
                        summary.forwarded, summary.total, summary.objects, summary.rejected
                    );
                    Ok::<(), Error>(())
                }
                Err(e) => {
                    error!("Error streaming CloudTrail logs: {e}");
                    Err(Error::from(e))
                }
            }
        }
    }))
    .await
}
