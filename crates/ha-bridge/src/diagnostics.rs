//! Diagnostic channel
//!
//! Everything the engine skips or rejects ends up here: malformed input,
//! writes against unknown or read-only targets, remote failures, ack
//! timeouts. Records are deduplicated by kind and subject (most recent
//! last) and every record is also emitted through `tracing`.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Distinct messages kept per entry
const MAX_MESSAGES_PER_ENTRY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedTopic,
    MalformedPayload,
    UnknownEntity,
    UnknownAttribute,
    NotWritable,
    InvalidValue,
    /// A value was ready but the slot store has no such slot
    MissingSlot,
    RemoteFailure,
    AckTimeout,
    CacheFailure,
}

impl DiagnosticKind {
    /// Input noise is logged at debug, everything else at warn
    fn is_noise(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::MalformedTopic | DiagnosticKind::MalformedPayload
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedTopic => "malformed_topic",
            DiagnosticKind::MalformedPayload => "malformed_payload",
            DiagnosticKind::UnknownEntity => "unknown_entity",
            DiagnosticKind::UnknownAttribute => "unknown_attribute",
            DiagnosticKind::NotWritable => "not_writable",
            DiagnosticKind::InvalidValue => "invalid_value",
            DiagnosticKind::MissingSlot => "missing_slot",
            DiagnosticKind::RemoteFailure => "remote_failure",
            DiagnosticKind::AckTimeout => "ack_timeout",
            DiagnosticKind::CacheFailure => "cache_failure",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiagnosticKey {
    kind: DiagnosticKind,
    subject: String,
}

/// One deduplicated diagnostic
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEntry {
    pub kind: DiagnosticKind,
    /// Entity id, slot identifier or topic the diagnostic is about
    pub subject: String,
    pub messages: VecDeque<String>,
    pub count: u64,
    pub first_occurred: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticEntry {
    fn new(kind: DiagnosticKind, subject: String, message: String) -> Self {
        let now = Utc::now();
        Self {
            kind,
            subject,
            messages: VecDeque::from([message]),
            count: 1,
            first_occurred: now,
            timestamp: now,
        }
    }

    fn update(&mut self, message: String) {
        self.count += 1;
        self.timestamp = Utc::now();
        if !self.messages.contains(&message) {
            if self.messages.len() >= MAX_MESSAGES_PER_ENTRY {
                self.messages.pop_front();
            }
            self.messages.push_back(message);
        }
    }

    pub fn latest_message(&self) -> Option<&str> {
        self.messages.back().map(String::as_str)
    }
}

/// Bounded, deduplicating diagnostic store
#[derive(Debug)]
pub struct Diagnostics {
    entries: IndexMap<DiagnosticKey, DiagnosticEntry>,
    max_entries: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl Diagnostics {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a diagnostic and log it
    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let subject = subject.into();
        let message = message.into();

        if kind.is_noise() {
            debug!(kind = %kind, subject = %subject, "{}", message);
        } else {
            warn!(kind = %kind, subject = %subject, "{}", message);
        }

        let key = DiagnosticKey {
            kind,
            subject: subject.clone(),
        };
        let entry = match self.entries.shift_remove(&key) {
            Some(mut existing) => {
                existing.update(message);
                existing
            }
            None => DiagnosticEntry::new(kind, subject, message),
        };
        self.entries.insert(key, entry);

        while self.entries.len() > self.max_entries {
            self.entries.shift_remove_index(0);
        }
    }

    /// Most recent entry for a kind/subject pair
    pub fn get(&self, kind: DiagnosticKind, subject: &str) -> Option<&DiagnosticEntry> {
        self.entries.get(&DiagnosticKey {
            kind,
            subject: subject.to_string(),
        })
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries.values()
    }

    pub fn count(&self, kind: DiagnosticKind) -> u64 {
        self.entries
            .values()
            .filter(|e| e.kind == kind)
            .map(|e| e.count)
            .sum()
    }

    /// Entries as JSON, most recent first
    pub fn to_list(&self) -> Vec<serde_json::Value> {
        self.entries
            .values()
            .rev()
            .filter_map(|e| serde_json::to_value(e).ok())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
