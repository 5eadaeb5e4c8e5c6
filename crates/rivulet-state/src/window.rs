//! Row window bounded by count and by age.
//!
//! Both bounds are enforced on every push and again before every read, so a
//! snapshot never holds more than `max_rows` items or anything older than
//! `max_age`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct WindowBuffer<T> {
    items: VecDeque<(T, Instant)>,
    max_rows: usize,
    max_age: Duration,
}

impl<T> WindowBuffer<T> {
    pub fn new(max_rows: usize, max_age: Duration) -> Result<Self> {
        if max_rows == 0 {
            return Err(Error::ZeroCapacity { what: "window" });
        }
        Ok(Self {
            items: VecDeque::new(),
            max_rows,
            max_age,
        })
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `item` and evict down to both bounds. Returns how many items
    /// were evicted.
    pub fn push(&mut self, item: T, now: Instant) -> usize {
        self.items.push_back((item, now));
        let mut evicted = self.evict_expired(now);
        while self.items.len() > self.max_rows {
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Drop items older than `max_age`.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some((_, at)) = self.items.front() {
            if now.saturating_duration_since(*at) <= self.max_age {
                break;
            }
            self.items.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Remove and return everything, oldest first, after evicting stale items.
    pub fn take(&mut self, now: Instant) -> Vec<T> {
        self.evict_expired(now);
        self.items.drain(..).map(|(item, _)| item).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> WindowBuffer<T> {
    /// Current contents, oldest first, after evicting stale items.
    pub fn snapshot(&mut self, now: Instant) -> Vec<T> {
        self.evict_expired(now);
        self.items.iter().map(|(item, _)| item.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_rejected() {
        assert!(WindowBuffer::<u8>::new(0, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn count_bound_keeps_newest() {
        let now = Instant::now();
        let mut w = WindowBuffer::new(3, Duration::from_secs(60)).unwrap();
        let evicted: usize = (0..5).map(|i| w.push(i, now)).sum();
        assert_eq!(w.snapshot(now), vec![2, 3, 4]);
        assert_eq!(evicted, 2);
    }

    #[test]
    fn age_bound_applies_on_read() {
        let start = Instant::now();
        let mut w = WindowBuffer::new(10, Duration::from_secs(5)).unwrap();
        w.push("old", start);
        w.push("new", start + Duration::from_secs(3));
        assert_eq!(w.snapshot(start + Duration::from_secs(5)), vec!["old", "new"]);
        assert_eq!(w.snapshot(start + Duration::from_secs(6)), vec!["new"]);
    }

    #[test]
    fn take_empties_buffer() {
        let now = Instant::now();
        let mut w = WindowBuffer::new(10, Duration::from_secs(5)).unwrap();
        w.push(1, now);
        w.push(2, now);
        assert_eq!(w.take(now), vec![1, 2]);
        assert!(w.is_empty());
    }
}
