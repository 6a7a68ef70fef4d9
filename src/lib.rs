pub mod error;
pub mod history;
pub mod model;
pub mod parser;
pub mod server;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;

use crate::error::StoreError;
use crate::history::{FileSink, HistoryRecorder, HistorySink};
use crate::model::{ConfigRecord, HistoryEntry};

/// Authoritative holder of the current configuration set.
///
/// Single source of truth for existence and JSON well-formedness.
/// Every successful operation, reads included, is recorded in the
/// audit trail. Reads are deliberately side-effect-bearing: the trail
/// doubles as a compliance access log.
///
/// One coarse lock serializes all operations; the history append
/// happens under it, so trail order always matches commit order.
pub struct ConfigStore {
    records: Mutex<HashMap<String, ConfigRecord>>,
    history: HistoryRecorder,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("record_count", &self.records.lock().expect("Poisoned Lock").len())
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl ConfigStore {
    pub fn new(sink: Box<dyn HistorySink>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            history: HistoryRecorder::new(sink),
        }
    }

    /// Store backed by a line-oriented log file for the audit trail.
    pub fn open(history_log: &Path) -> Self {
        Self::new(Box::new(FileSink::new(history_log)))
    }

    /// Stores a new record iff `id` is unused and `payload` parses as
    /// JSON. The payload text is retained verbatim.
    pub fn create(&self, id: &str, payload: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("Poisoned Lock");

        if records.contains_key(id) {
            return Err(StoreError::AlreadyExists { id: id.to_string() });
        }
        validate_json(payload)?;

        records.insert(id.to_string(), ConfigRecord::new(id, payload));
        self.record_event(format!("Configuration created: {}", id));
        Ok(())
    }

    /// Returns the current payload text.
    ///
    /// Audited: a successful read appends "Configuration read: {id}"
    /// to the trail. This is a documented contract, not a quirk.
    pub fn read(&self, id: &str) -> Result<String, StoreError> {
        let records = self.records.lock().expect("Poisoned Lock");

        let record = records.get(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        let payload = record.payload.clone();

        self.record_event(format!("Configuration read: {}", id));
        Ok(payload)
    }

    /// Replaces the payload wholesale iff `id` exists and the new
    /// payload parses as JSON. The previous payload is not retained.
    pub fn update(&self, id: &str, payload: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("Poisoned Lock");

        let record = records.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        validate_json(payload)?;

        record.payload = payload.to_string();
        self.record_event(format!("Configuration updated: {}", id));
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("Poisoned Lock");

        if records.remove(id).is_none() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        self.record_event(format!("Configuration deleted: {}", id));
        Ok(())
    }

    /// Audit-only deployment checkpoint. Asserts `id` exists and marks
    /// the trail; no payload changes and no separate "deployed" state.
    pub fn deploy_changes(&self, id: &str) -> Result<(), StoreError> {
        let records = self.records.lock().expect("Poisoned Lock");

        if !records.contains_key(id) {
            return Err(StoreError::NotFound { id: id.to_string() });
        }

        self.record_event(format!("Configuration changes deployed: {}", id));
        Ok(())
    }

    /// Overwrites the payload with caller-supplied prior content.
    ///
    /// The rolled-back payload is validated the same way `update`
    /// validates, so the store never holds malformed JSON. See
    /// DESIGN.md for the rationale.
    pub fn rollback(&self, id: &str, previous_payload: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("Poisoned Lock");

        let record = records.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        validate_json(previous_payload)?;

        record.payload = previous_payload.to_string();
        self.record_event(format!("Configuration rolled back: {}", id));
        Ok(())
    }

    /// The audit trail so far, in append order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    fn record_event(&self, description: String) {
        // A dead sink must not unwind a committed mutation; the
        // in-memory entry is already retained by the recorder.
        if let Err(e) = self.history.record(&description) {
            warn!("History sink unavailable ({}): {}", e, description);
        }
    }
}

fn validate_json(payload: &str) -> Result<(), StoreError> {
    serde_json::from_str::<serde_json::Value>(payload)
        .map(|_| ())
        .map_err(|_| StoreError::InvalidFormat)
}
