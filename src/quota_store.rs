use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-client usage record for the current quota window.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl QuotaEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at < now
    }
}

/// In-memory map from client identifier to [`QuotaEntry`].
///
/// A single coarse lock guards the whole map; contention is low (one
/// decision per request, one sweep per hour) and holding the lock across
/// the limiter's read-modify-write keeps per-client decisions atomic.
#[derive(Debug, Default)]
pub struct QuotaStore {
    entries: RwLock<HashMap<String, QuotaEntry>>,
}

impl QuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the entry for `client_id`. Entries whose window has
    /// already ended are reported as absent even if the reclaimer has
    /// not physically removed them yet.
    pub fn get(&self, client_id: &str, now: DateTime<Utc>) -> Option<QuotaEntry> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(client_id)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    /// Unconditionally overwrites the entry for `client_id`.
    pub fn set(&self, client_id: &str, entry: QuotaEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(client_id.to_string(), entry);
    }

    /// Removes every entry whose window ended before `now`. Returns the
    /// number of entries removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Runs `f` with exclusive access to the map, so a caller's
    /// read-modify-write sequence cannot interleave with another request
    /// for the same client or with a reclaimer sweep.
    pub fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, QuotaEntry>) -> R) -> R {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        f(&mut entries)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
