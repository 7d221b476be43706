use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::Reading;
use crate::storage::HistoryBlob;

/// Entries older than this are discarded on every trim.
pub const RETENTION_HOURS: i64 = 24;

pub fn default_retention() -> Duration {
    Duration::hours(RETENTION_HOURS)
}

/// A timestamped reading retained for the history endpoint. Serialized with
/// epoch-millisecond timestamps, which is also the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub inside: f64,
    pub outside: f64,
}

impl HistoryEntry {
    pub fn new(timestamp: DateTime<Utc>, reading: Reading) -> Self {
        Self {
            timestamp,
            inside: reading.inside,
            outside: reading.outside,
        }
    }
}

/// Rolling time-windowed log of readings, append-only and oldest first.
/// Append, trim, and the best-effort durable write happen under one lock so
/// concurrent readers never observe a partially updated sequence.
pub struct HistoryStore {
    window: Duration,
    entries: Mutex<Vec<HistoryEntry>>,
    blob: Option<HistoryBlob>,
}

impl HistoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(Vec::new()),
            blob: None,
        }
    }

    /// Restore the log from the durable blob on cold start. A corrupt or
    /// unreadable blob means starting empty, not failing.
    pub fn with_persistence(window: Duration, blob: HistoryBlob) -> Self {
        let entries = match blob.load() {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("Failed to restore history, starting empty: {}", err);
                Vec::new()
            }
        };
        Self {
            window,
            entries: Mutex::new(entries),
            blob: Some(blob),
        }
    }

    /// Append one entry, drop everything beyond the retention window, then
    /// persist. Persistence failures are logged and swallowed on purpose:
    /// losing history must never block serving the current reading.
    pub fn record(&self, entry: HistoryEntry) {
        let now = entry.timestamp;
        let mut entries = self.entries.lock().unwrap();
        entries.push(entry);
        Self::trim_entries(&mut entries, now, self.window);

        if let Some(blob) = &self.blob {
            if let Err(err) = blob.save(&entries) {
                log::warn!("Failed to persist history: {}", err);
            }
        }
    }

    /// Remove entries with `timestamp <= now - window`. Idempotent.
    pub fn trim(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap();
        Self::trim_entries(&mut entries, now, self.window);
    }

    /// Snapshot of the current log, oldest first.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn trim_entries(entries: &mut Vec<HistoryEntry>, now: DateTime<Utc>, window: Duration) {
        let cutoff = now - window;
        entries.retain(|entry| entry.timestamp > cutoff);
    }
}
