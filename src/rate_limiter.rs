use crate::quota_store::{QuotaEntry, QuotaStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Requests with no resolvable client address share this bucket.
const FALLBACK_CLIENT_ID: &str = "unknown";

/// Metadata attached to an allowed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Allowance {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Metadata attached to a denied request. Carries both the raw seconds
/// for machine use and a human-readable message rounded to whole hours.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed(Allowance),
    Denied(Denial),
}

/// Snapshot returned by the inspection path. `reset_at` is `None` when
/// the client has no active window.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Fixed-window daily quota limiter.
///
/// Enforces at most `limit` requests per client per window. The window
/// opens on a client's first request (or first request after the prior
/// window lapsed) and ends `window` later. Denied requests do not
/// consume quota. The limiter itself never fails: an empty client
/// identifier degrades to a shared fallback bucket.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<QuotaStore>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<QuotaStore>, limit: u32, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Gates one request from `client_id` at time `now`.
    ///
    /// The whole read-modify-write runs under the store's lock, so
    /// concurrent requests from the same client cannot double-spend a
    /// slot or skip an increment.
    pub fn check(&self, client_id: &str, now: DateTime<Utc>) -> Decision {
        let client_id = normalize_client_id(client_id);
        let limit = self.limit;
        let window = self.window;

        self.store.with_entries(|entries| {
            if let Some(entry) = entries.get_mut(client_id) {
                if !entry.is_expired(now) {
                    if entry.count >= limit {
                        // Denied requests leave the entry untouched.
                        return Decision::Denied(Denial::new(limit, entry.reset_at, now));
                    }
                    entry.count += 1;
                    return Decision::Allowed(Allowance {
                        limit,
                        remaining: limit.saturating_sub(entry.count),
                        reset_at: entry.reset_at,
                    });
                }
            }

            // Absent, or present but expired: open a fresh window.
            let reset_at = now + window;
            entries.insert(client_id.to_string(), QuotaEntry { count: 1, reset_at });
            Decision::Allowed(Allowance {
                limit,
                remaining: limit.saturating_sub(1),
                reset_at,
            })
        })
    }

    /// Reports the client's quota without consuming any of it.
    pub fn status(&self, client_id: &str, now: DateTime<Utc>) -> QuotaStatus {
        let client_id = normalize_client_id(client_id);
        match self.store.get(client_id, now) {
            Some(entry) => QuotaStatus {
                limit: self.limit,
                remaining: self.limit.saturating_sub(entry.count),
                reset_at: Some(entry.reset_at),
            },
            None => QuotaStatus {
                limit: self.limit,
                remaining: self.limit,
                reset_at: None,
            },
        }
    }
}

impl Denial {
    fn new(limit: u32, reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis = (reset_at - now).num_milliseconds().max(0) as u64;
        let retry_after_secs = millis.div_ceil(1000);
        let hours = retry_after_secs.div_ceil(3600);
        let message = format!(
            "You've reached the daily limit of {} requests. Try again in {} hour{}.",
            limit,
            hours,
            if hours == 1 { "" } else { "s" },
        );
        Self {
            limit,
            reset_at,
            retry_after_secs,
            message,
        }
    }
}

fn normalize_client_id(client_id: &str) -> &str {
    if client_id.trim().is_empty() {
        FALLBACK_CLIENT_ID
    } else {
        client_id
    }
}
