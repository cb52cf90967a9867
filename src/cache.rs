//! TTL caches for upstream API responses
//!
//! Two independent instances are held by the pricing service: catalogue
//! search results (long TTL, product identity rarely changes) and market
//! data (short TTL, prices move). Expired entries are evicted lazily on
//! lookup. Time is passed in explicitly so tests control the clock.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Key -> (payload, inserted-at) cache with a fixed time-to-live
pub struct TtlCache<T> {
    entries: HashMap<String, (T, DateTime<Utc>)>,
    ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up a key. An entry at or past its TTL is removed and treated as
    /// absent regardless of prior successful fetches.
    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<T> {
        match self.entries.get(key) {
            Some((_, inserted)) if now - *inserted >= self.ttl => {
                self.entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    pub fn insert(&mut self, key: String, value: T, now: DateTime<Utc>) {
        self.entries.insert(key, (value, now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn served_within_ttl() {
        let mut cache = TtlCache::new(Duration::hours(6));
        cache.insert("k".to_string(), 42, t0());

        let just_before = t0() + Duration::hours(6) - Duration::milliseconds(1);
        assert_eq!(cache.get("k", just_before), Some(42));
    }

    #[test]
    fn absent_after_ttl() {
        let mut cache = TtlCache::new(Duration::hours(6));
        cache.insert("k".to_string(), 42, t0());

        let just_after = t0() + Duration::hours(6) + Duration::milliseconds(1);
        assert_eq!(cache.get("k", just_after), None);
        // lazy eviction removed the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_key_is_none() {
        let mut cache: TtlCache<i32> = TtlCache::new(Duration::minutes(15));
        assert_eq!(cache.get("nope", t0()), None);
    }

    #[test]
    fn reinsert_refreshes_timestamp() {
        let mut cache = TtlCache::new(Duration::minutes(15));
        cache.insert("k".to_string(), 1, t0());
        cache.insert("k".to_string(), 2, t0() + Duration::minutes(10));

        let later = t0() + Duration::minutes(20);
        assert_eq!(cache.get("k", later), Some(2));
    }
}
