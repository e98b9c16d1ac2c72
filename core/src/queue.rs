//! Per (type, state) FIFO of pending requester IDs with a time-to-live
//! (spec.md §4.3). Lives inside the Ledger's locked state so enqueue and
//! head-of-line checks are always consistent with the resource table.

use chrono::{DateTime, Duration, Utc};
use common_lib::types::QueuedRequest;
use std::collections::{HashMap, VecDeque};

pub type QueueKey = (String, String);

#[derive(Default)]
pub struct RequestQueues {
    queues: HashMap<QueueKey, VecDeque<QueuedRequest>>,
}

impl RequestQueues {
    pub fn new() -> Self {
        Self::default()
    }

    fn gc_one(queue: &mut VecDeque<QueuedRequest>, now: DateTime<Utc>, ttl: Duration) {
        queue.retain(|req| now - req.enqueued_at <= ttl);
    }

    /// Drops expired entries across every queue. Run by the periodic GC sweep
    /// (default every minute, spec.md §4.3) and opportunistically on enqueue.
    pub fn gc_expired(&mut self, now: DateTime<Utc>, ttl: Duration) {
        for queue in self.queues.values_mut() {
            Self::gc_one(queue, now, ttl);
        }
        self.queues.retain(|_, q| !q.is_empty());
    }

    /// Idempotent enroll: a duplicate ID keeps its original position.
    pub fn enqueue(&mut self, key: QueueKey, id: &str, now: DateTime<Utc>, ttl: Duration) {
        let queue = self.queues.entry(key).or_default();
        Self::gc_one(queue, now, ttl);
        if !queue.iter().any(|r| r.id == id) {
            queue.push_back(QueuedRequest {
                id: id.to_string(),
                enqueued_at: now,
            });
        }
    }

    /// True if `id` is first in the `(type, state)` queue and not expired.
    pub fn is_head(&mut self, key: &QueueKey, id: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        if let Some(queue) = self.queues.get_mut(key) {
            Self::gc_one(queue, now, ttl);
        }
        matches!(self.queues.get(key).and_then(|q| q.front()), Some(r) if r.id == id)
    }

    /// Whether the queue for `key` has any (non-expired) waiters.
    pub fn is_empty(&mut self, key: &QueueKey, now: DateTime<Utc>, ttl: Duration) -> bool {
        if let Some(queue) = self.queues.get_mut(key) {
            Self::gc_one(queue, now, ttl);
        }
        self.queues.get(key).map_or(true, |q| q.is_empty())
    }

    pub fn remove(&mut self, key: &QueueKey, id: &str) {
        if let Some(queue) = self.queues.get_mut(key) {
            queue.retain(|r| r.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> QueueKey {
        ("project".to_string(), "free".to_string())
    }

    #[test]
    fn fifo_fairness() {
        let mut q = RequestQueues::new();
        let ttl = Duration::seconds(30);
        let t0 = Utc::now();
        q.enqueue(key(), "r1", t0, ttl);
        q.enqueue(key(), "r2", t0, ttl);
        assert!(q.is_head(&key(), "r1", t0, ttl));
        assert!(!q.is_head(&key(), "r2", t0, ttl));
        q.remove(&key(), "r1");
        assert!(q.is_head(&key(), "r2", t0, ttl));
    }

    #[test]
    fn duplicate_enqueue_preserves_position() {
        let mut q = RequestQueues::new();
        let ttl = Duration::seconds(30);
        let t0 = Utc::now();
        q.enqueue(key(), "r1", t0, ttl);
        q.enqueue(key(), "r2", t0, ttl);
        q.enqueue(key(), "r1", t0 + Duration::seconds(1), ttl);
        assert!(q.is_head(&key(), "r1", t0, ttl));
    }

    #[test]
    fn expired_entry_loses_its_slot() {
        let mut q = RequestQueues::new();
        let ttl = Duration::seconds(30);
        let t0 = Utc::now();
        q.enqueue(key(), "r1", t0, ttl);
        let later = t0 + Duration::seconds(31);
        assert!(!q.is_head(&key(), "r1", later, ttl));
        assert!(q.is_empty(&key(), later, ttl));
    }
}
