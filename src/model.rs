use serde::{Deserialize, Serialize};

/// A named configuration document under management.
///
/// The payload is the raw JSON text exactly as the caller supplied it —
/// validated for well-formedness on the way in, never re-serialized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    /// Caller-assigned unique key, immutable once created.
    pub id: String,

    /// Verbatim JSON document text.
    pub payload: String,
}

impl ConfigRecord {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// One line of the audit trail.
///
/// Entries are immutable once appended; ordering is append order and
/// timestamps are non-decreasing (second precision, wall clock).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Wall-clock time of recording, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,

    /// Human-readable label naming the operation and affected id.
    pub description: String,
}

impl HistoryEntry {
    /// Renders the entry in the durable-sink line format:
    /// `[YYYY-MM-DD HH:MM:SS] <description>`.
    pub fn to_line(&self) -> String {
        format!("[{}] {}", self.timestamp, self.description)
    }
}
