//! A keyed table that expires as a whole.
//!
//! The table carries a single deadline rather than one per entry. Callers
//! decide what expiry means: flush and start over, or rebuild from a source
//! and swap the new contents in.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

/// `now + period`, saturating at the furthest deadline the clock can hold.
fn deadline(now: Instant, period: Duration) -> Instant {
    now.checked_add(period)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Roughly thirty years, the horizon tokio itself uses for "never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone)]
pub struct ExpiringTable<V> {
    table: IndexMap<String, V>,
    period: Duration,
    expires: Instant,
}

impl<V> ExpiringTable<V> {
    /// A table that starts out already expired, so the first access fills it.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            table: IndexMap::new(),
            period,
            expires: now,
        }
    }

    /// A table whose first period starts at `now`.
    pub fn started(period: Duration, now: Instant) -> Self {
        Self {
            expires: deadline(now, period),
            ..Self::new(period, now)
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn expires(&self) -> Instant {
        self.expires
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires
    }

    /// Empty the table and restart the clock if the deadline passed.
    /// Returns `true` when a flush happened.
    pub fn flush_if_expired(&mut self, now: Instant) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        self.table.clear();
        self.restart(now);
        true
    }

    /// Swap in freshly built contents and restart the clock.
    pub fn replace(&mut self, table: IndexMap<String, V>, now: Instant) {
        self.table = table;
        self.restart(now);
    }

    fn restart(&mut self, now: Instant) {
        self.expires = deadline(now, self.period);
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.table.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.table.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_expired_immediately() {
        let now = Instant::now();
        let t: ExpiringTable<i32> = ExpiringTable::new(Duration::from_secs(60), now);
        assert!(t.is_expired(now));
        let t: ExpiringTable<i32> = ExpiringTable::started(Duration::from_secs(60), now);
        assert!(!t.is_expired(now));
    }

    #[test]
    fn flush_clears_everything_and_restarts_clock() {
        let start = Instant::now();
        let mut t = ExpiringTable::started(Duration::from_secs(10), start);
        t.insert("a", 1);
        t.insert("b", 2);
        assert!(!t.flush_if_expired(start + Duration::from_secs(9)));
        assert_eq!(t.len(), 2);

        let later = start + Duration::from_secs(10);
        assert!(t.flush_if_expired(later));
        assert!(t.is_empty());
        assert_eq!(t.expires(), later + Duration::from_secs(10));
    }

    #[test]
    fn replace_swaps_contents() {
        let start = Instant::now();
        let mut t = ExpiringTable::new(Duration::from_secs(5), start);
        t.insert("old", 0);
        let mut fresh = IndexMap::new();
        fresh.insert("x".to_string(), 1);
        fresh.insert("y".to_string(), 2);
        t.replace(fresh, start);
        assert_eq!(t.keys(), vec!["x".to_string(), "y".to_string()]);
        assert!(!t.contains("old"));
        assert!(!t.is_expired(start + Duration::from_secs(4)));
    }

    #[test]
    fn oversized_period_never_expires() {
        let now = Instant::now();
        let mut t: ExpiringTable<i32> = ExpiringTable::started(Duration::MAX, now);
        assert!(!t.is_expired(now + Duration::from_secs(86_400 * 365)));
        t.insert("a", 1);
        t.replace(IndexMap::new(), now);
        assert!(t.expires() > now);
    }
}
