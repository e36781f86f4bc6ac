use crate::quota_store::QuotaStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodic sweep that evicts expired quota entries to bound memory.
///
/// Best-effort housekeeping: the limiter already treats expired entries
/// as absent, so a missed sweep affects memory, not correctness. The
/// task is aborted on shutdown (and on drop, so tests that construct
/// many instances leak nothing).
pub struct Reclaimer {
    handle: JoinHandle<()>,
}

impl Reclaimer {
    /// Spawns the sweep loop, firing every `interval` for the lifetime
    /// of the process.
    pub fn spawn(store: Arc<QuotaStore>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it so the
            // first sweep happens one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(Utc::now());
                if removed > 0 {
                    tracing::debug!(
                        target: "reelgate::reclaimer",
                        removed,
                        retained = store.len(),
                        "swept expired quota entries"
                    );
                }
            }
        });
        Self { handle }
    }

    /// Stops the sweep loop.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota_store::QuotaEntry;
    use chrono::Duration as ChronoDuration;

    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_entries_on_schedule() {
        let store = Arc::new(QuotaStore::new());
        let now = Utc::now();
        store.set(
            "stale",
            QuotaEntry {
                count: 20,
                reset_at: now - ChronoDuration::hours(1),
            },
        );
        store.set(
            "active",
            QuotaEntry {
                count: 1,
                reset_at: now + ChronoDuration::hours(48),
            },
        );

        let reclaimer = Reclaimer::spawn(store.clone(), Duration::from_secs(3600));
        // Let the task register its timer before advancing the clock.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(3601)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.len(), 1);
        reclaimer.shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let store = Arc::new(QuotaStore::new());
        let reclaimer = Reclaimer::spawn(store, Duration::from_secs(3600));
        reclaimer.shutdown();
        // Dropping after an explicit shutdown must not panic.
        drop(reclaimer);
    }
}
