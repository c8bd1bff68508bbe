//! Time-windowed deduplication of mention IDs.
//!
//! The transport redelivers within a bounded retry window, so eviction is by
//! age (insertion order), not LRU. The set is also capacity-bounded: when
//! full, the oldest entries are evicted first, which accepts the risk of
//! reprocessing very old redeliveries (logged, not hidden).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct DedupInner {
    seen: HashMap<String, Instant>,
    /// Insertion order for age-based eviction.
    order: VecDeque<String>,
}

/// Concurrent seen-set of recently processed mention IDs.
///
/// All operations take one internal lock, so [`Deduplicator::check_and_mark`]
/// is atomic: concurrent workers racing on the same ID can never both claim
/// it. Under contention the set may over-reject (claim an ID whose window
/// later crashes), never under-reject.
pub struct Deduplicator {
    inner: Mutex<DedupInner>,
    capacity: usize,
    ttl: Duration,
}

impl Deduplicator {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        assert!(capacity > 0, "dedup capacity must be at least 1");
        Self {
            inner: Mutex::new(DedupInner {
                seen: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    /// Whether `mention_id` was marked seen within the window.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn seen(&self, mention_id: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup mutex poisoned");
        Self::evict_expired(&mut inner, self.ttl);
        inner.seen.contains_key(mention_id)
    }

    /// Mark `mention_id` as seen, evicting expired and over-capacity entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn mark_seen(&self, mention_id: &str) {
        let mut inner = self.inner.lock().expect("dedup mutex poisoned");
        self.insert(&mut inner, mention_id);
    }

    /// Atomically check and mark: returns `true` when `mention_id` was not
    /// seen (and is now marked), `false` when it was already in the window.
    /// This is the call consumers use; a separate seen-then-mark pair would
    /// leave a race window between workers.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn check_and_mark(&self, mention_id: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup mutex poisoned");
        Self::evict_expired(&mut inner, self.ttl);
        if inner.seen.contains_key(mention_id) {
            return false;
        }
        self.insert(&mut inner, mention_id);
        true
    }

    /// Number of IDs currently held.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup mutex poisoned").seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, inner: &mut DedupInner, mention_id: &str) {
        Self::evict_expired(inner, self.ttl);
        if inner.seen.contains_key(mention_id) {
            return;
        }
        while inner.seen.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.seen.remove(&oldest);
            tracing::warn!(
                capacity = self.capacity,
                evicted = %oldest,
                "dedup window at capacity, evicting oldest entry; old redeliveries may reprocess"
            );
        }
        inner.seen.insert(mention_id.to_string(), Instant::now());
        inner.order.push_back(mention_id.to_string());
    }

    fn evict_expired(inner: &mut DedupInner, ttl: Duration) {
        let now = Instant::now();
        while let Some(front) = inner.order.front() {
            let expired = inner
                .seen
                .get(front)
                .is_none_or(|&at| now.duration_since(at) >= ttl);
            if !expired {
                break;
            }
            let id = inner.order.pop_front().expect("front checked above");
            inner.seen.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const LONG_TTL: Duration = Duration::from_secs(3600);

    #[test]
    fn second_delivery_within_window_is_rejected() {
        let dedup = Deduplicator::new(100, LONG_TTL);
        assert!(dedup.check_and_mark("t3_abc"));
        assert!(!dedup.check_and_mark("t3_abc"));
        assert!(dedup.seen("t3_abc"));
    }

    #[test]
    fn distinct_ids_are_independent() {
        let dedup = Deduplicator::new(100, LONG_TTL);
        assert!(dedup.check_and_mark("a"));
        assert!(dedup.check_and_mark("b"));
        assert!(!dedup.seen("c"));
    }

    #[test]
    fn mark_seen_then_seen_agrees() {
        let dedup = Deduplicator::new(100, LONG_TTL);
        assert!(!dedup.seen("x"));
        dedup.mark_seen("x");
        assert!(dedup.seen("x"));
        // Re-marking is a no-op.
        dedup.mark_seen("x");
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let dedup = Deduplicator::new(100, Duration::from_millis(20));
        dedup.mark_seen("old");
        std::thread::sleep(Duration::from_millis(40));
        assert!(!dedup.seen("old"), "expired entry must read as unseen");
        assert!(dedup.check_and_mark("old"), "expired entry can be reclaimed");
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let dedup = Deduplicator::new(2, LONG_TTL);
        dedup.mark_seen("first");
        dedup.mark_seen("second");
        dedup.mark_seen("third");
        assert_eq!(dedup.len(), 2);
        assert!(!dedup.seen("first"), "oldest entry is evicted");
        assert!(dedup.seen("second"));
        assert!(dedup.seen("third"));
    }

    #[test]
    fn concurrent_check_and_mark_claims_exactly_once() {
        let dedup = Arc::new(Deduplicator::new(1000, LONG_TTL));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let dedup = Arc::clone(&dedup);
            handles.push(std::thread::spawn(move || {
                let mut claims = 0usize;
                for i in 0..100 {
                    if dedup.check_and_mark(&format!("id-{i}")) {
                        claims += 1;
                    }
                }
                claims
            }));
        }
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100, "each ID must be claimed by exactly one thread");
        assert_eq!(dedup.len(), 100);
    }
}
