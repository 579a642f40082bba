//! Nonce Store
//!
//! Remembers accepted nonces so a signed request cannot be replayed.
//!
//! # Retention
//!
//! A record older than the retention window counts as absent and is evicted
//! lazily when the same nonce shows up again, which makes that nonce usable
//! once more. Replay protection therefore rests on the authenticator's
//! freshness tolerance, which must stay well below the retention window.
//!
//! Whenever an insert leaves the store above its high-water mark, every
//! aged-out record is removed in one pass.
//!
//! # Concurrency
//!
//! One mutex guards the whole map. Check-and-insert is atomic: of several
//! concurrent callers presenting the same fresh nonce, exactly one succeeds.
//! The lock also serializes unrelated authentications, which is acceptable at
//! webhook volumes.

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Nonce store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceStoreConfig {
    /// How long an accepted nonce blocks reuse
    pub retention: StdDuration,

    /// Store size above which an eviction sweep runs
    pub high_water_mark: usize,
}

impl Default for NonceStoreConfig {
    fn default() -> Self {
        Self {
            retention: StdDuration::from_secs(60 * 60), // 1 hour
            high_water_mark: 10_000,
        }
    }
}

/// Replay guard keyed by nonce
#[derive(Debug)]
pub struct NonceStore {
    /// nonce -> first seen at (claimed request time)
    nonces: Mutex<HashMap<String, DateTime<Utc>>>,

    retention: Duration,

    high_water_mark: usize,

    clock: Arc<dyn Clock>,
}

impl NonceStore {
    /// Create a store driven by the system clock
    pub fn new(config: NonceStoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store driven by `clock`
    pub fn with_clock(config: NonceStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
            retention: Duration::from_std(config.retention).unwrap_or(Duration::MAX),
            high_water_mark: config.high_water_mark,
            clock,
        }
    }

    /// Record `nonce` unless a live record already exists
    ///
    /// Returns `true` when the nonce was accepted and recorded, `false` when
    /// it is a replay.
    pub fn consume_if_unseen(&self, nonce: &str, observed_at: DateTime<Utc>) -> bool {
        let now = self.clock.now();
        let mut nonces = self.nonces.lock();

        if let Some(&first_seen) = nonces.get(nonce) {
            if !self.is_expired(first_seen, now) {
                return false;
            }
            nonces.remove(nonce);
        }

        nonces.insert(nonce.to_string(), observed_at);

        if nonces.len() > self.high_water_mark {
            let before = nonces.len();
            nonces.retain(|_, first_seen| !self.is_expired(*first_seen, now));
            tracing::debug!(
                removed = before - nonces.len(),
                remaining = nonces.len(),
                "Nonce store sweep"
            );
        }

        true
    }

    /// Remove every aged-out record, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut nonces = self.nonces.lock();
        let before = nonces.len();
        nonces.retain(|_, first_seen| !self.is_expired(*first_seen, now));
        before - nonces.len()
    }

    /// Number of records currently held, expired or not
    pub fn len(&self) -> usize {
        self.nonces.lock().len()
    }

    /// True when no records are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, first_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(first_seen) > self.retention
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(NonceStoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const T0: i64 = 1_700_000_000;

    fn store_with_clock(config: NonceStoreConfig) -> (NonceStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(T0));
        (NonceStore::with_clock(config, clock.clone()), clock)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_first_use_accepted_second_rejected() {
        let (store, _) = store_with_clock(NonceStoreConfig::default());

        assert!(store.consume_if_unseen("n-1", at(T0)));
        assert!(!store.consume_if_unseen("n-1", at(T0)));
        assert!(store.consume_if_unseen("n-2", at(T0)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_nonce_reusable_after_retention() {
        let (store, clock) = store_with_clock(NonceStoreConfig::default());

        assert!(store.consume_if_unseen("n-1", at(T0)));

        // Exactly at the boundary the record is still live
        clock.advance(Duration::hours(1));
        assert!(!store.consume_if_unseen("n-1", at(T0)));

        clock.advance(Duration::seconds(1));
        assert!(store.consume_if_unseen("n-1", clock.now()));
        assert_eq!(store.len(), 1);

        // The fresh record blocks again
        assert!(!store.consume_if_unseen("n-1", clock.now()));
    }

    #[test]
    fn test_age_is_measured_from_claimed_time() {
        let (store, clock) = store_with_clock(NonceStoreConfig {
            retention: StdDuration::from_secs(60),
            high_water_mark: 10_000,
        });

        // Claimed 50s in the past: ages out 10s later
        assert!(store.consume_if_unseen("n-1", at(T0 - 50)));
        clock.advance(Duration::seconds(11));
        assert!(store.consume_if_unseen("n-1", clock.now()));
    }

    #[test]
    fn test_sweep_runs_above_high_water_mark() {
        let (store, clock) = store_with_clock(NonceStoreConfig {
            retention: StdDuration::from_secs(60),
            high_water_mark: 3,
        });

        for i in 0..3 {
            assert!(store.consume_if_unseen(&format!("old-{i}"), clock.now()));
        }
        assert_eq!(store.len(), 3);

        clock.advance(Duration::seconds(61));

        // Fourth insert crosses the mark; the three aged-out records go
        assert!(store.consume_if_unseen("fresh", clock.now()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_keeps_live_records() {
        let (store, clock) = store_with_clock(NonceStoreConfig {
            retention: StdDuration::from_secs(60),
            high_water_mark: 2,
        });

        assert!(store.consume_if_unseen("a", clock.now()));
        assert!(store.consume_if_unseen("b", clock.now()));
        clock.advance(Duration::seconds(30));
        assert!(store.consume_if_unseen("c", clock.now()));

        assert_eq!(store.len(), 3);
        assert!(!store.consume_if_unseen("a", clock.now()));
    }

    #[test]
    fn test_sweep_expired_reports_removed() {
        let (store, clock) = store_with_clock(NonceStoreConfig::default());

        assert!(store.consume_if_unseen("a", clock.now()));
        assert!(store.consume_if_unseen("b", clock.now()));
        clock.advance(Duration::minutes(30));
        assert!(store.consume_if_unseen("c", clock.now()));
        clock.advance(Duration::minutes(31));

        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_concurrent_same_nonce_exactly_one_wins() {
        let store = Arc::new(NonceStore::default());
        let now = Utc::now();

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = Arc::clone(&store);
                    s.spawn(move || store.consume_if_unseen("contested", now) as usize)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(winners, 1);
    }
}
