// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unwrapping of the invocation payload into object references.
//!
//! Only the fields needed to locate a log object are read; everything else in the
//! notification is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::config::EventType;
use crate::errors::ParseError;

/// Location of one CloudTrail log object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub region: String,
    pub bucket: String,
    pub key: String,
}

/// An S3 object-created notification, possibly covering several objects.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    records: Vec<ObjectCreatedRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ObjectCreatedRecord {
    #[serde(rename = "awsRegion", default)]
    aws_region: String,
    s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct S3Object {
    key: String,
}

#[derive(Debug, Deserialize)]
struct NotificationEvent {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    #[serde(rename = "Sns")]
    sns: NotificationMessage,
}

#[derive(Debug, Deserialize)]
struct NotificationMessage {
    // S3 notification, JSON-encoded as a string
    #[serde(rename = "Message")]
    message: String,
}

impl ObjectCreatedEvent {
    pub fn objects(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.records.iter().map(|record| ObjectRef {
            region: record.aws_region.clone(),
            bucket: record.s3.bucket.name.clone(),
            key: record.s3.object.key.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Extracts the object-created notifications carried by an invocation payload.
///
/// A direct S3 payload yields exactly one notification. An SNS payload yields one per SNS
/// record, each parsed from the record's message; exactly one level of nesting is
/// unwrapped and an unparseable message fails the whole payload.
pub fn unwrap_envelope(
    event_type: EventType,
    payload: Value,
) -> Result<Vec<ObjectCreatedEvent>, ParseError> {
    match event_type {
        EventType::S3 => {
            let event = serde_json::from_value(payload)
                .map_err(|e| ParseError::new("S3 notification", e))?;
            Ok(vec![event])
        }
        EventType::Sns => {
            let envelope: NotificationEvent = serde_json::from_value(payload)
                .map_err(|e| ParseError::new("SNS notification", e))?;
            envelope
                .records
                .iter()
                .map(|record| {
                    serde_json::from_str(&record.sns.message)
                        .map_err(|e| ParseError::new("SNS message", e))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn s3_event(objects: &[(&str, &str, &str)]) -> Value {
        let records: Vec<Value> = objects
            .iter()
            .map(|(region, bucket, key)| {
                json!({
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "awsRegion": region,
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "s3SchemaVersion": "1.0",
                        "bucket": {"name": bucket, "arn": format!("arn:aws:s3:::{bucket}")},
                        "object": {"key": key, "size": 1024}
                    }
                })
            })
            .collect();
        json!({ "Records": records })
    }

    fn sns_event(messages: &[String]) -> Value {
        let records: Vec<Value> = messages
            .iter()
            .map(|message| {
                json!({
                    "EventSource": "aws:sns",
                    "Sns": {"Type": "Notification", "Message": message}
                })
            })
            .collect();
        json!({ "Records": records })
    }

    #[test]
    fn test_direct_notification() {
        let payload = s3_event(&[
            ("us-east-1", "trail-bucket", "AWSLogs/1/a.json.gz"),
            ("us-east-1", "trail-bucket", "AWSLogs/1/b.json.gz"),
        ]);
        let events = unwrap_envelope(EventType::S3, payload).unwrap();
        assert_eq!(events.len(), 1);
        let objects: Vec<_> = events[0].objects().collect();
        assert_eq!(
            objects,
            vec![
                ObjectRef {
                    region: "us-east-1".to_string(),
                    bucket: "trail-bucket".to_string(),
                    key: "AWSLogs/1/a.json.gz".to_string(),
                },
                ObjectRef {
                    region: "us-east-1".to_string(),
                    bucket: "trail-bucket".to_string(),
                    key: "AWSLogs/1/b.json.gz".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_sns_unwraps_one_level() {
        let inner = s3_event(&[("eu-west-1", "org-trail", "AWSLogs/2/c.json.gz")]);
        let payload = sns_event(&[inner.to_string()]);
        let events = unwrap_envelope(EventType::Sns, payload).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].objects().next(),
            Some(ObjectRef {
                region: "eu-west-1".to_string(),
                bucket: "org-trail".to_string(),
                key: "AWSLogs/2/c.json.gz".to_string(),
            })
        );
    }

    #[test]
    fn test_sns_one_event_per_record() {
        let payload = sns_event(&[
            s3_event(&[("us-east-1", "a", "1")]).to_string(),
            s3_event(&[("us-east-2", "b", "2"), ("us-east-2", "b", "3")]).to_string(),
        ]);
        let events = unwrap_envelope(EventType::Sns, payload).unwrap();
        let sizes: Vec<_> = events.iter().map(ObjectCreatedEvent::len).collect();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn test_sns_unparseable_message_fails() {
        let payload = sns_event(&[
            s3_event(&[("us-east-1", "a", "1")]).to_string(),
            "not json at all".to_string(),
        ]);
        let err = unwrap_envelope(EventType::Sns, payload).unwrap_err();
        assert_eq!(err.context, "SNS message");
    }

    #[test]
    fn test_sns_message_is_not_unwrapped_twice() {
        // a message that is itself an SNS envelope carries no S3 records
        let inner = sns_event(&[s3_event(&[("us-east-1", "a", "1")]).to_string()]);
        let payload = sns_event(&[inner.to_string()]);
        assert!(unwrap_envelope(EventType::Sns, payload).is_err());
    }

    #[test]
    fn test_s3_payload_with_wrong_shape_fails() {
        let payload = json!({"Records": [{"awsRegion": "us-east-1"}]});
        let err = unwrap_envelope(EventType::S3, payload).unwrap_err();
        assert_eq!(err.context, "S3 notification");
    }

    #[test]
    fn test_empty_notification() {
        let events = unwrap_envelope(EventType::S3, json!({})).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_empty());
    }
}
