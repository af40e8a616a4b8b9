// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exclusion filters for CloudTrail records.
//!
//! Filters let operators keep noisy, high-volume events out of every sink. Each rule names
//! a service and an API call; a record matching any rule is dropped before it is routed.
//!
//! # Configuration
//!
//! Rules come from `CT_EVENT_FILTERS` as a comma-separated list of `source:eventName`
//! tokens, where `source` is the short service name:
//!
//! ```text
//! CT_EVENT_FILTERS=s3:GetObject,kms:Decrypt
//! ```
//!
//! Tokens that do not split into exactly two parts on `:` are ignored.
//!
//! # Matching
//!
//! A rule matches a record when **either** the record's `eventName` equals the rule's event
//! name, **or** the record's `eventSource` equals the rule's fully-qualified source
//! (`<source>.amazonaws.com`). The two halves are independent: `s3:GetObject` drops every
//! `GetObject` call regardless of service, and every call made to S3.

use crate::config::Config;
use crate::record::Record;

/// Domain appended to the short source name of a rule.
pub const EVENT_SOURCE_DOMAIN: &str = "amazonaws.com";

/// A single exclusion rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFilter {
    pub event_name: String,
    /// Fully-qualified event source, e.g. `s3.amazonaws.com`.
    pub event_source: String,
}

impl EventFilter {
    #[must_use]
    pub fn new(source: &str, event_name: &str) -> Self {
        Self {
            event_name: event_name.to_string(),
            event_source: format!("{source}.{EVENT_SOURCE_DOMAIN}"),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.event_name() == Some(self.event_name.as_str())
            || record.event_source() == Some(self.event_source.as_str())
    }
}

/// The set of exclusion rules, evaluated against every record.
///
/// An engine with no rules never drops anything.
#[derive(Clone, Debug, Default)]
pub struct FilterEngine {
    rules: Vec<EventFilter>,
}

impl FilterEngine {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        config
            .event_filters
            .as_deref()
            .map(Self::parse)
            .unwrap_or_default()
    }

    /// Parses a `source:eventName,...` list, skipping malformed tokens.
    #[must_use]
    pub fn parse(filters: &str) -> Self {
        let rules = filters
            .split(',')
            .filter_map(|token| {
                let parts = token.split(':').collect::<Vec<&str>>();
                match parts.as_slice() {
                    [source, event_name] => Some(EventFilter::new(source, event_name)),
                    _ => None,
                }
            })
            .collect();
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[EventFilter] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns `true` when the record must be dropped.
    #[must_use]
    pub fn is_excluded(&self, record: &Record) -> bool {
        self.rules.iter().any(|rule| rule.matches(record))
    }
}
