//! Preview-result caching for the scheduler facade.
//!
//! The cache is an explicit capability injected into the planner; its
//! lifecycle belongs to the hosting process. Entries are keyed by
//! (user, scope, date) and expire on a short TTL. Staleness within
//! the TTL is accepted, and concurrent writers simply last-write-win.

use std::time::Duration;

use chrono::NaiveDate;
use moka::sync::Cache;

use crate::model::{Scope, UserId};
use crate::packer::ScheduleResult;

/// Default preview TTL: five minutes.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Composite cache key for one preview computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user: UserId,
    pub scope: Scope,
    pub date: NaiveDate,
}

impl CacheKey {
    pub fn new(user: impl Into<UserId>, scope: Scope, date: NaiveDate) -> Self {
        Self {
            user: user.into(),
            scope,
            date,
        }
    }
}

/// Key-value store for computed schedules.
pub trait ScheduleCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<ScheduleResult>;
    fn put(&self, key: CacheKey, value: ScheduleResult);
}

/// Moka-backed TTL cache.
pub struct MokaScheduleCache {
    inner: Cache<CacheKey, ScheduleResult>,
}

impl MokaScheduleCache {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(1024)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MokaScheduleCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS))
    }
}

impl ScheduleCache for MokaScheduleCache {
    fn get(&self, key: &CacheKey) -> Option<ScheduleResult> {
        self.inner.get(key)
    }

    fn put(&self, key: CacheKey, value: ScheduleResult) {
        self.inner.insert(key, value);
    }
}

/// Cache that stores nothing. Useful in tests and for callers that
/// want every preview recomputed.
#[derive(Debug, Default)]
pub struct NullScheduleCache;

impl ScheduleCache for NullScheduleCache {
    fn get(&self, _key: &CacheKey) -> Option<ScheduleResult> {
        None
    }

    fn put(&self, _key: CacheKey, _value: ScheduleResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ScheduleResult {
        ScheduleResult {
            blocks: Vec::new(),
            window_minutes: 480,
            planned_minutes: 90,
            capacity_usage: 90.0 / 480.0,
        }
    }

    fn key(user: &str) -> CacheKey {
        CacheKey::new(user, Scope::Day, NaiveDate::from_ymd_opt(2024, 6, 10).unwrap())
    }

    #[test]
    fn moka_cache_round_trips() {
        let cache = MokaScheduleCache::default();
        assert!(cache.get(&key("u1")).is_none());

        cache.put(key("u1"), sample_result());
        let hit = cache.get(&key("u1")).unwrap();
        assert_eq!(hit.planned_minutes, 90);

        // Other keys are unaffected.
        assert!(cache.get(&key("u2")).is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = MokaScheduleCache::new(Duration::from_millis(20));
        cache.put(key("u1"), sample_result());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key("u1")).is_none());
    }

    #[test]
    fn null_cache_never_stores() {
        let cache = NullScheduleCache;
        cache.put(key("u1"), sample_result());
        assert!(cache.get(&key("u1")).is_none());
    }
}
