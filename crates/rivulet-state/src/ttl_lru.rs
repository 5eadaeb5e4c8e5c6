//! Capacity-bounded LRU map with optional per-entry time-to-live.
//!
//! Expired entries are invisible to every read and are dropped lazily when
//! touched.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::error::{Error, Result};

struct Slot<V> {
    value: V,
    inserted_at: Instant,
}

fn expired<V>(ttl: Option<Duration>, slot: &Slot<V>, now: Instant) -> bool {
    match ttl {
        Some(ttl) => now.saturating_duration_since(slot.inserted_at) >= ttl,
        None => false,
    }
}

pub struct TtlLru<V> {
    entries: LruCache<String, Slot<V>>,
    ttl: Option<Duration>,
}

impl<V> TtlLru<V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity).ok_or(Error::ZeroCapacity { what: "lru" })?;
        Ok(Self {
            entries: LruCache::new(cap),
            ttl,
        })
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fresh value for `key`, promoting it to most recently used.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<&V> {
        let stale = expired(self.ttl, self.entries.peek(key)?, now);
        if stale {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|slot| &slot.value)
    }

    pub fn contains(&mut self, key: &str, now: Instant) -> bool {
        self.get(key, now).is_some()
    }

    /// Store `value`, restarting the entry's clock. Returns the key evicted
    /// to make room, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: V, now: Instant) -> Option<String> {
        let key = key.into();
        let slot = Slot {
            value,
            inserted_at: now,
        };
        match self.entries.push(key.clone(), slot) {
            Some((old, _)) if old != key => Some(old),
            _ => None,
        }
    }

    /// Insert `key` unless a fresh entry exists. Returns `true` when the key
    /// was not present, i.e. the caller sees it for the first time.
    pub fn insert_if_absent(&mut self, key: &str, value: V, now: Instant) -> bool {
        if self.contains(key, now) {
            return false;
        }
        self.insert(key, value, now);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.pop(key).map(|slot| slot.value)
    }

    /// Keys of fresh entries, most recently used first.
    pub fn keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, slot)| !expired(self.ttl, *slot, now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V> std::fmt::Debug for TtlLru<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLru")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity())
            .field("ttl", &self.ttl)
            .finish()
    }
}
