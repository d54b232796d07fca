//! Best-effort audit trail of attempted commands.
//!
//! Entries are handed to an [`AuditSink`] and immediately forgotten; a sink
//! must never block the dispatcher, and sink failures are the sink's own
//! problem to log.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One attempted command, recorded whether or not it was allowed or
/// succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub tool_id: String,
    pub command: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl AuditEntry {
    pub fn now(tool_id: &str, command: &str, url: Option<String>) -> Self {
        AuditEntry {
            tool_id: tool_id.to_string(),
            command: command.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            url,
        }
    }
}

/// Append-only destination for audit entries. `record` must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Writes entries to the log stream.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            tool_id = %entry.tool_id,
            command = %entry.command,
            timestamp = entry.timestamp,
            url = entry.url.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Keeps entries in memory for inspection. Used by tests and by embedders
/// that export the trail themselves.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        MemoryAuditSink::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
