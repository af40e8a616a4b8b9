// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::io::Write;

pub const REGION: &str = "us-east-1";
pub const BUCKET: &str = "org-cloudtrail";

/// A CloudTrail log file with `count` events cycling through a few common API calls
pub fn log_file(count: usize) -> Vec<u8> {
    const CALLS: [(&str, &str); 4] = [
        ("GetObject", "s3"),
        ("Decrypt", "kms"),
        ("AssumeRole", "sts"),
        ("DescribeInstances", "ec2"),
    ];
    let records: Vec<Value> = (0..count)
        .map(|i| {
            let (name, source) = CALLS[i % CALLS.len()];
            json!({
                "eventVersion": "1.08",
                "eventID": format!("event-{i:05}"),
                "eventName": name,
                "eventSource": format!("{source}.amazonaws.com"),
                "awsRegion": REGION,
                "userIdentity": {"type": "AssumedRole", "accountId": "123456789012"}
            })
        })
        .collect();
    serde_json::to_vec(&json!({ "Records": records })).unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Direct S3 object-created notification for `keys` in [`BUCKET`]
pub fn s3_notification(keys: &[&str]) -> Value {
    let records: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": REGION,
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": BUCKET},
                    "object": {"key": key}
                }
            })
        })
        .collect();
    json!({ "Records": records })
}

/// SNS notification with one record per message
pub fn sns_notification(messages: &[String]) -> Value {
    let records: Vec<Value> = messages
        .iter()
        .map(|message| {
            json!({
                "EventSource": "aws:sns",
                "Sns": {
                    "Type": "Notification",
                    "TopicArn": "arn:aws:sns:us-east-1:123456789012:cloudtrail",
                    "Message": message
                }
            })
        })
        .collect();
    json!({ "Records": records })
}

pub fn event_id(record: &[u8]) -> String {
    let value: Value = serde_json::from_slice(record).unwrap();
    value["eventID"].as_str().unwrap().to_string()
}
