// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One CloudTrail event, kept as an untyped JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// Records parsed from a single log object, in file order.
pub type RecordBatch = Vec<Record>;

impl Record {
    pub fn event_name(&self) -> Option<&str> {
        self.0.get("eventName").and_then(Value::as_str)
    }

    pub fn event_source(&self) -> Option<&str> {
        self.0.get("eventSource").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Canonical encoding sent to every sink: compact JSON with keys in sorted order.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(&self.0).map(Bytes::from)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
