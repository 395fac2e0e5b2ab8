//! Event-id deduplication
//!
//! A webhook sender may deliver the same notification more than once. Each
//! event carries a caller-unique `X-Event-Id`; this store remembers ids it
//! has seen so the pipeline can acknowledge duplicates without reprocessing.
//!
//! This is a process-local map. In a multi-instance deployment it must be
//! replaced with a shared TTL store; the pipeline only depends on
//! [`IdempotencyStore::check_and_set`], so the swap is contained here.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct IdempotencyStore {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Atomically check whether `event_id` is new and record it if so.
    ///
    /// Returns `true` for a first sighting (process the event) and `false`
    /// for a duplicate within the TTL window. Expired entries are swept
    /// lazily on each call; staleness only matters relative to new arrivals,
    /// so no background timer is needed.
    pub fn check_and_set(&self, event_id: &str) -> bool {
        self.check_and_set_at(event_id, Utc::now())
    }

    fn check_and_set_at(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        let mut seen = self.seen.lock().expect("idempotency lock poisoned");

        let cutoff = now - self.ttl;
        seen.retain(|_, first_seen| *first_seen >= cutoff);

        if seen.contains_key(event_id) {
            return false;
        }

        seen.insert(event_id.to_string(), now);
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sighting_is_new() {
        let store = IdempotencyStore::new(24);
        assert!(store.check_and_set("evt-1"));
    }

    #[test]
    fn test_replay_is_duplicate() {
        let store = IdempotencyStore::new(24);
        assert!(store.check_and_set("evt-1"));
        assert!(!store.check_and_set("evt-1"));
        assert!(!store.check_and_set("evt-1"));
    }

    #[test]
    fn test_distinct_ids_are_independent() {
        let store = IdempotencyStore::new(24);
        assert!(store.check_and_set("evt-1"));
        assert!(store.check_and_set("evt-2"));
        assert!(!store.check_and_set("evt-1"));
    }

    #[test]
    fn test_expired_entry_is_readmitted() {
        let store = IdempotencyStore::new(24);
        let t0 = Utc::now();

        assert!(store.check_and_set_at("evt-1", t0));
        assert!(!store.check_and_set_at("evt-1", t0 + Duration::hours(23)));

        // Past the TTL the id counts as new again
        assert!(store.check_and_set_at("evt-1", t0 + Duration::hours(25)));
    }

    #[test]
    fn test_sweep_removes_expired_entries() {
        let store = IdempotencyStore::new(1);
        let t0 = Utc::now();

        store.check_and_set_at("evt-1", t0);
        store.check_and_set_at("evt-2", t0);
        assert_eq!(store.len(), 2);

        store.check_and_set_at("evt-3", t0 + Duration::hours(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_same_id_yields_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(IdempotencyStore::new(24));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || store.check_and_set("evt-race")));
        }

        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }
}
