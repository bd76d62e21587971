//! Content-addressed LRU cache of evaluator outputs.
//!
//! Keys are the sha256 of the canonical JSON of `(assignment, scenario)`.
//! Assignments serialize from a `BTreeMap`, so equal assignments always
//! produce the same key regardless of insertion order.

use crate::domain::optimization::ParameterAssignment;
use crate::domain::performance::BacktestResult;
use crate::domain::ports::Scenario;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct LruState {
    entries: HashMap<String, (BacktestResult, u64)>,
    /// Access tick -> key; the first entry is the least recently used
    order: BTreeMap<u64, String>,
    tick: u64,
}

impl LruState {
    fn touch(&mut self, key: &str) -> Option<BacktestResult> {
        self.tick += 1;
        let tick = self.tick;
        let (result, last) = self.entries.get_mut(key)?;
        self.order.remove(last);
        *last = tick;
        self.order.insert(tick, key.to_string());
        Some(result.clone())
    }

    fn insert(&mut self, key: String, result: BacktestResult, capacity: usize) {
        self.tick += 1;
        let tick = self.tick;
        if let Some((_, last)) = self.entries.insert(key.clone(), (result, tick)) {
            self.order.remove(&last);
        }
        self.order.insert(tick, key);

        while self.entries.len() > capacity {
            match self.order.pop_first() {
                Some((_, oldest)) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

/// Thread-safe memo of `(assignment, scenario) -> BacktestResult`.
///
/// Concurrent misses on the same key may both compute; the last write wins.
pub struct ResultCache {
    state: Mutex<LruState>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(LruState::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Deterministic content key for an evaluation
    pub fn key(assignment: &ParameterAssignment, scenario: &Scenario) -> String {
        let canonical = serde_json::to_vec(&(assignment, scenario)).unwrap_or_else(|_| {
            // Both types serialize infallibly; fall back to the display form
            format!("{}|{:?}", assignment, scenario).into_bytes()
        });
        hex::encode(Sha256::digest(&canonical))
    }

    pub fn get(&self, key: &str) -> Option<BacktestResult> {
        let found = match self.state.lock() {
            Ok(mut guard) => guard.touch(key),
            Err(poisoned) => {
                tracing::error!("ResultCache: Lock poisoned during read, recovering");
                poisoned.into_inner().touch(key)
            }
        };
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn insert(&self, key: String, result: BacktestResult) {
        match self.state.lock() {
            Ok(mut guard) => guard.insert(key, result, self.capacity),
            Err(poisoned) => {
                tracing::error!("ResultCache: Lock poisoned during write, recovering");
                poisoned.into_inner().insert(key, result, self.capacity);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.state.lock() {
            Ok(guard) => guard.entries.len(),
            Err(poisoned) => poisoned.into_inner().entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{ParamKey, ParamValue};

    fn assignment(period: f64) -> ParameterAssignment {
        ParameterAssignment::new().with(ParamKey::new("rsi", "period"), ParamValue::Number(period))
    }

    fn result(ret: f64) -> BacktestResult {
        BacktestResult {
            total_return_pct: ret,
            ..Default::default()
        }
    }

    #[test]
    fn test_key_is_deterministic_and_scenario_sensitive() {
        let scenario = Scenario::new("btc-2023").with_seed(7);
        let a = ResultCache::key(&assignment(14.0), &scenario);
        let b = ResultCache::key(&assignment(14.0), &scenario);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, ResultCache::key(&assignment(15.0), &scenario));
        assert_ne!(
            a,
            ResultCache::key(&assignment(14.0), &Scenario::new("btc-2023").with_seed(8))
        );
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = ResultCache::new(4);
        assert!(cache.get("missing").is_none());
        cache.insert("k".to_string(), result(3.0));
        assert_eq!(cache.get("k"), Some(result(3.0)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_lru_eviction_keeps_recently_used() {
        let cache = ResultCache::new(2);
        cache.insert("a".to_string(), result(1.0));
        cache.insert("b".to_string(), result(2.0));
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), result(3.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(result(1.0)));
        assert_eq!(cache.get("c"), Some(result(3.0)));
    }

    #[test]
    fn test_overwrite_same_key_does_not_grow() {
        let cache = ResultCache::new(2);
        cache.insert("a".to_string(), result(1.0));
        cache.insert("a".to_string(), result(1.0));
        assert_eq!(cache.len(), 1);
    }
}
