// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a raw CloudTrail log object into records.
//!
//! Objects are delivered either as plain JSON or gzip-compressed JSON, as declared by the
//! object's content type. Both forms hold a single JSON document:
//!
//! ```json
//! {"Records": [{"eventName": "...", "eventSource": "...", ...}, ...]}
//! ```

use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, error};

use crate::errors::{DecodeError, ParseError, StreamerError};
use crate::record::{Record, RecordBatch};

pub const GZIP_CONTENT_TYPE: &str = "application/x-gzip";
const GZIP_MEDIA_TYPES: [&str; 2] = [GZIP_CONTENT_TYPE, "application/gzip"];

/// Object body as returned by the object store, together with its declared content type.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl RawObject {
    pub fn new(body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    pub fn is_gzip(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let media_type = ct.split(';').next().unwrap_or_default().trim();
            GZIP_MEDIA_TYPES
                .iter()
                .any(|gzip| media_type.eq_ignore_ascii_case(gzip))
        })
    }
}

#[derive(Deserialize)]
struct CloudTrailFile {
    // A file without a Records member decodes as empty
    #[serde(rename = "Records", default)]
    records: Vec<Record>,
}

/// Decompresses (when needed) and parses a log object.
///
/// Fails with [`DecodeError`] on a corrupt gzip stream and [`ParseError`] on malformed
/// JSON; in both cases nothing from the object is delivered.
pub fn decode(object: RawObject) -> Result<RecordBatch, StreamerError> {
    let body = if object.is_gzip() {
        let mut decompressed = Vec::new();
        GzDecoder::new(&object.body[..])
            .read_to_end(&mut decompressed)
            .map_err(|e| {
                error!("Error unzipping cloudtrail json file: {e}");
                DecodeError::Gzip(e)
            })?;
        Bytes::from(decompressed)
    } else {
        object.body
    };

    let file: CloudTrailFile = serde_json::from_slice(&body).map_err(|e| {
        error!("Error unmarshalling object to CloudTrailFile: {e}");
        ParseError::new("cloudtrail log file", e)
    })?;

    debug!("Decoded {} records from {} bytes", file.records.len(), body.len());
    Ok(file.records)
}
