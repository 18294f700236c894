//! In-memory response cache for the task read endpoints.
//!
//! Holds three families of derived views, each a complete snapshot of its
//! query at caching time (never a delta):
//!
//! - `AllTasks` — every task
//! - `MyTasks_User_{userId}` — tasks assigned to one user
//! - `TaskById_{taskId}` — a single task
//!
//! ## Expiration
//!
//! Every entry carries two clocks: a sliding window reset on each hit and
//! an absolute ceiling fixed at insertion. Whichever fires first evicts
//! the entry. Expiry is checked lazily on access; a miss is a normal
//! control-flow branch, not a failure. Reference policy: sliding 5min,
//! absolute 30min.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value;

/// A cache key, rendered deterministically into its string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The full task list
    AllTasks,

    /// Tasks assigned to one user
    MyTasks(i64),

    /// A single task
    TaskById(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllTasks => write!(f, "AllTasks"),
            CacheKey::MyTasks(user_id) => write!(f, "MyTasks_User_{}", user_id),
            CacheKey::TaskById(task_id) => write!(f, "TaskById_{}", task_id),
        }
    }
}

struct CacheEntry {
    value: Value,
    inserted: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(value: Value) -> Self {
        let now = Instant::now();
        Self {
            value,
            inserted: now,
            last_accessed: now,
        }
    }

    /// Sliding or absolute, whichever fires first wins
    fn is_expired(&self, sliding: Duration, absolute: Duration) -> bool {
        self.last_accessed.elapsed() > sliding || self.inserted.elapsed() > absolute
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Process-wide response cache with a dual sliding/absolute policy
///
/// Constructed once at startup and shared by reference through the
/// mutation service and the read handlers; there are no hidden statics.
pub struct TaskCache {
    sliding: Duration,
    absolute: Duration,
    generation: AtomicU64,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl TaskCache {
    pub fn new(sliding: Duration, absolute: Duration) -> Self {
        Self {
            sliding,
            absolute,
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Current invalidation counter.
    ///
    /// Read handlers snapshot this *before* querying the store and hand it
    /// back to [`set_if_current`](Self::set_if_current), so a snapshot
    /// computed from a pre-mutation read cannot be re-cached after that
    /// mutation has already invalidated the key.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Looks up a key, resetting its sliding window on a hit
    ///
    /// Expired entries are evicted on the way.
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if entry.is_expired(self.sliding, self.absolute) => {
                entries.remove(key);
                None
            }
            Some(entry) => {
                entry.touch();
                Some(entry.value.clone())
            }
            None => None,
        }
    }

    /// Stores a complete snapshot under a key, restarting both clocks
    pub fn set(&self, key: CacheKey, value: Value) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, CacheEntry::new(value));
    }

    /// Stores a snapshot only if no invalidation has run since `observed`
    /// was taken with [`generation`](Self::generation).
    ///
    /// The counter is re-checked under the write lock, and `remove` bumps
    /// it under the same lock, so a racing invalidation either bumps first
    /// (the insert is skipped, costing one extra miss) or runs after and
    /// evicts the entry we just wrote. Either way a pre-mutation snapshot
    /// never survives its own invalidation.
    pub fn set_if_current(&self, key: CacheKey, value: Value, observed: u64) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if self.generation.load(Ordering::Acquire) != observed {
            return;
        }
        entries.insert(key, CacheEntry::new(value));
    }

    /// Evicts a key; absent keys are fine
    pub fn remove(&self, key: &CacheKey) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.remove(key);
    }

    /// Whether a live (non-expired) entry exists, without touching it
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.sliding, self.absolute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(sliding_ms: u64, absolute_ms: u64) -> TaskCache {
        TaskCache::new(
            Duration::from_millis(sliding_ms),
            Duration::from_millis(absolute_ms),
        )
    }

    #[test]
    fn test_key_strings() {
        assert_eq!(CacheKey::AllTasks.to_string(), "AllTasks");
        assert_eq!(CacheKey::MyTasks(7).to_string(), "MyTasks_User_7");
        assert_eq!(CacheKey::TaskById(42).to_string(), "TaskById_42");
    }

    #[test]
    fn test_get_set_remove() {
        let cache = cache(1000, 5000);
        assert_eq!(cache.get(&CacheKey::AllTasks), None);

        cache.set(CacheKey::AllTasks, json!([1, 2, 3]));
        assert_eq!(cache.get(&CacheKey::AllTasks), Some(json!([1, 2, 3])));

        cache.remove(&CacheKey::AllTasks);
        assert_eq!(cache.get(&CacheKey::AllTasks), None);
    }

    #[test]
    fn test_set_if_current_skips_a_raced_snapshot() {
        let cache = cache(1000, 5000);

        // A mutation invalidates between the store read and the insert;
        // the pre-mutation snapshot must not land.
        let observed = cache.generation();
        cache.remove(&CacheKey::AllTasks);
        cache.set_if_current(CacheKey::AllTasks, json!("stale"), observed);
        assert_eq!(cache.get(&CacheKey::AllTasks), None);

        // Unraced, the insert goes through as usual.
        let observed = cache.generation();
        cache.set_if_current(CacheKey::AllTasks, json!("fresh"), observed);
        assert_eq!(cache.get(&CacheKey::AllTasks), Some(json!("fresh")));
    }

    #[test]
    fn test_sliding_expiration() {
        let cache = cache(50, 10_000);
        cache.set(CacheKey::TaskById(1), json!("v"));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get(&CacheKey::TaskById(1)), None);
    }

    #[test]
    fn test_access_resets_sliding_window() {
        let cache = cache(60, 10_000);
        cache.set(CacheKey::TaskById(1), json!("v"));

        // Keep the entry warm past what a single window would allow.
        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(30));
            assert!(cache.get(&CacheKey::TaskById(1)).is_some());
        }
    }

    #[test]
    fn test_absolute_ceiling_beats_sliding() {
        let cache = cache(60, 100);
        cache.set(CacheKey::TaskById(1), json!("v"));

        // Touch repeatedly; the absolute ceiling still evicts.
        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(40));
            cache.get(&CacheKey::TaskById(1));
        }
        assert_eq!(cache.get(&CacheKey::TaskById(1)), None);
    }

    #[test]
    fn test_contains_does_not_touch() {
        let cache = cache(50, 10_000);
        cache.set(CacheKey::AllTasks, json!("v"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.contains(&CacheKey::AllTasks));
        std::thread::sleep(Duration::from_millis(30));
        // A get() at 30ms would have reset the window; contains() must not.
        assert!(!cache.contains(&CacheKey::AllTasks));
    }
}
