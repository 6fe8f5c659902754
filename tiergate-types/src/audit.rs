//! Audit trail entries and the sink the core appends them to.
//!
//! The core never reads audit entries back. Sinks are called synchronously
//! and must not fail the caller; implementations log their own errors.

use crate::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EventId,
    /// Dotted action name, e.g. `membership.tier_changed`.
    pub action: String,
    /// Kind of thing acted on, e.g. `membership` or `module`.
    pub target_type: String,
    pub target_id: String,
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            action: action.into(),
            target_type: target_type.into(),
            target_id: target_id.into(),
            details,
            at: Utc::now(),
        }
    }
}

/// Append-only audit collaborator.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry);
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _entry: AuditEntry) {}
}

/// Keeps entries in memory so callers can inspect what was appended.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry appended so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Entries whose action equals `action`.
    pub fn entries_for(&self, action: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
