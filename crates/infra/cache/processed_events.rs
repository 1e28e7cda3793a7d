//! Process-local memory of recently settled payment event ids.
//!
//! This is a fast path in front of the durable `processed_payment_events`
//! table and never the source of truth: a miss always falls through to the
//! database. Entries expire after `ttl`; when either the entry count or the
//! key byte budget is exceeded the oldest entries are evicted first.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ProcessedEventCacheOptions {
    pub max_entries: usize,
    pub max_key_bytes: usize,
    pub ttl: Duration,
}

impl Default for ProcessedEventCacheOptions {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_key_bytes: 1024 * 1024,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    seen: HashMap<String, DateTime<Utc>>,
    /// One entry per key of `seen`, oldest first.
    order: VecDeque<(String, DateTime<Utc>)>,
    key_bytes: usize,
}

impl CacheState {
    fn pop_oldest(&mut self) {
        if let Some((event_id, _)) = self.order.pop_front() {
            if self.seen.remove(&event_id).is_some() {
                self.key_bytes = self.key_bytes.saturating_sub(event_id.len());
            }
        }
    }

    fn record(&mut self, event_id: &str, now: DateTime<Utc>) {
        if self.seen.insert(event_id.to_string(), now).is_some() {
            if let Some(position) = self.order.iter().position(|(queued, _)| queued == event_id) {
                self.order.remove(position);
            }
        } else {
            self.key_bytes += event_id.len();
        }
        self.order.push_back((event_id.to_string(), now));
    }
}

#[derive(Debug)]
pub struct ProcessedEventCache {
    options: ProcessedEventCacheOptions,
    state: Mutex<CacheState>,
}

impl ProcessedEventCache {
    pub fn new(options: ProcessedEventCacheOptions) -> Self {
        Self {
            options,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.contains_at(event_id, Utc::now())
    }

    pub fn insert(&self, event_id: &str) {
        self.insert_at(event_id, Utc::now())
    }

    pub fn contains_at(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        let Ok(state) = self.state.lock() else {
            return false;
        };

        state
            .seen
            .get(event_id)
            .is_some_and(|inserted_at| !self.is_expired(*inserted_at, now))
    }

    pub fn insert_at(&self, event_id: &str, now: DateTime<Utc>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if event_id.len() > self.options.max_key_bytes || self.options.max_entries == 0 {
            return;
        }

        while let Some(inserted_at) = state.order.front().map(|(_, inserted_at)| *inserted_at) {
            if !self.is_expired(inserted_at, now) {
                break;
            }
            state.pop_oldest();
        }

        state.record(event_id, now);

        while state.seen.len() > self.options.max_entries
            || state.key_bytes > self.options.max_key_bytes
        {
            state.pop_oldest();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.seen.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, inserted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.options.ttl)
            .map(|ttl| inserted_at + ttl <= now)
            .unwrap_or(false)
    }
}

impl Default for ProcessedEventCache {
    fn default() -> Self {
        Self::new(ProcessedEventCacheOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + seconds, 0).unwrap()
    }

    fn cache(max_entries: usize, max_key_bytes: usize, ttl_secs: u64) -> ProcessedEventCache {
        ProcessedEventCache::new(ProcessedEventCacheOptions {
            max_entries,
            max_key_bytes,
            ttl: Duration::from_secs(ttl_secs),
        })
    }

    #[test]
    fn remembers_until_ttl() {
        let cache = cache(10, 1024, 60);
        cache.insert_at("evt_1", at(0));

        assert!(cache.contains_at("evt_1", at(59)));
        assert!(!cache.contains_at("evt_1", at(60)));
        assert!(!cache.contains_at("evt_2", at(0)));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let cache = cache(2, 1024, 600);
        cache.insert_at("evt_1", at(0));
        cache.insert_at("evt_2", at(1));
        cache.insert_at("evt_3", at(2));

        assert!(!cache.contains_at("evt_1", at(3)));
        assert!(cache.contains_at("evt_2", at(3)));
        assert!(cache.contains_at("evt_3", at(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn byte_budget_bounds_memory() {
        let cache = cache(100, 10, 600);
        cache.insert_at("evt_aaaa", at(0));
        cache.insert_at("evt_bbbb", at(1));

        assert!(!cache.contains_at("evt_aaaa", at(2)));
        assert!(cache.contains_at("evt_bbbb", at(2)));

        cache.insert_at("evt_far_too_long_for_budget", at(3));
        assert!(!cache.contains_at("evt_far_too_long_for_budget", at(3)));
    }

    #[test]
    fn reinsert_refreshes_entry() {
        let cache = cache(2, 1024, 600);
        cache.insert_at("evt_1", at(0));
        cache.insert_at("evt_2", at(1));
        cache.insert_at("evt_1", at(2));
        cache.insert_at("evt_3", at(3));

        assert!(cache.contains_at("evt_1", at(4)));
        assert!(cache.contains_at("evt_3", at(4)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reinsert_within_one_instant_keeps_the_live_entry() {
        let cache = cache(2, 1024, 600);
        cache.insert_at("evt_1", at(0));
        cache.insert_at("evt_2", at(0));
        cache.insert_at("evt_1", at(0));
        cache.insert_at("evt_3", at(0));

        assert!(cache.contains_at("evt_1", at(1)));
        assert!(!cache.contains_at("evt_2", at(1)));
        assert!(cache.contains_at("evt_3", at(1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn repeated_reinserts_do_not_grow_the_queue() {
        let cache = cache(10, 1024, 600);
        for second in 0..50 {
            cache.insert_at("evt_1", at(second));
        }

        let state = cache.state.lock().unwrap();
        assert_eq!(state.order.len(), 1);
        assert_eq!(state.key_bytes, "evt_1".len());
    }
}
