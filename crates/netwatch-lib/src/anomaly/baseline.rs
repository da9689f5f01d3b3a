//! Rolling per-node baselines
//!
//! Maintains mean and standard deviation for every `(node_id, metric)` pair
//! using Welford's online algorithm, so memory per key is constant no matter
//! how many samples a node has submitted.

use crate::models::Metric;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default bound on tracked `(node_id, metric)` pairs
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Baseline statistics at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BaselineSnapshot {
    pub mean: f64,
    pub stddev: f64,
    pub count: u64,
}

/// Welford accumulator for a single metric stream
#[derive(Debug, Clone, Default)]
pub struct RollingStats {
    count: u64,
    mean: f64,
    /// Sum of squared differences from the mean
    m2: f64,
}

impl RollingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a value into the running statistics
    pub fn add_sample(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation (Bessel's correction), 0 below two samples
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).max(0.0).sqrt()
    }

    pub fn snapshot(&self) -> BaselineSnapshot {
        BaselineSnapshot {
            mean: self.mean,
            stddev: self.std_dev(),
            count: self.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BaselineKey {
    node_id: String,
    metric: Metric,
}

#[derive(Debug)]
struct BaselineEntry {
    stats: Mutex<RollingStats>,
    last_observed: AtomicU64,
}

/// Concurrent store of rolling baselines keyed by node and metric
///
/// The map is only locked long enough to find or insert an entry. The
/// read-then-update step runs under the entry's own mutex, so observations
/// for different keys never wait on each other.
#[derive(Debug)]
pub struct BaselineEstimator {
    baselines: DashMap<BaselineKey, Arc<BaselineEntry>>,
    /// Maximum number of tracked keys, 0 for unbounded
    max_keys: usize,
    clock: AtomicU64,
    evictions: AtomicU64,
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED_KEYS)
    }
}

impl BaselineEstimator {
    /// Create an estimator tracking at most `max_keys` pairs (0 = unbounded)
    pub fn new(max_keys: usize) -> Self {
        Self {
            baselines: DashMap::new(),
            max_keys,
            clock: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Fold `value` into the baseline for `(node_id, metric)`
    ///
    /// Returns the snapshot as it was before `value` was added. Callers judge
    /// the value against this snapshot so a sample never dilutes the baseline
    /// it is compared to.
    pub fn observe(&self, node_id: &str, metric: Metric, value: f64) -> BaselineSnapshot {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let (entry, inserted) = self.entry(node_id, metric, tick);

        let before = {
            let mut stats = entry.stats.lock();
            let before = stats.snapshot();
            stats.add_sample(value);
            before
        };

        if inserted {
            self.evict_if_needed();
        }

        before
    }

    /// Current baseline for a key without modifying it
    pub fn snapshot(&self, node_id: &str, metric: Metric) -> Option<BaselineSnapshot> {
        let key = BaselineKey {
            node_id: node_id.to_string(),
            metric,
        };
        let entry = self.baselines.get(&key).map(|r| Arc::clone(r.value()))?;
        let snapshot = entry.stats.lock().snapshot();
        Some(snapshot)
    }

    /// All tracked baselines for a node, in `Metric::ALL` order
    pub fn node_snapshots(&self, node_id: &str) -> Vec<(Metric, BaselineSnapshot)> {
        Metric::ALL
            .iter()
            .filter_map(|metric| {
                self.snapshot(node_id, *metric)
                    .map(|snapshot| (*metric, snapshot))
            })
            .collect()
    }

    /// Number of tracked `(node_id, metric)` pairs
    pub fn tracked_keys(&self) -> usize {
        self.baselines.len()
    }

    /// Total number of baselines evicted to stay within capacity
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Find or insert the entry for a key, stamping it with `tick`
    ///
    /// New entries carry their tick from the moment they enter the map, so
    /// a concurrent eviction scan never sees them as the oldest key.
    fn entry(&self, node_id: &str, metric: Metric, tick: u64) -> (Arc<BaselineEntry>, bool) {
        let key = BaselineKey {
            node_id: node_id.to_string(),
            metric,
        };

        if let Some(existing) = self.baselines.get(&key) {
            existing.value().last_observed.fetch_max(tick, Ordering::Relaxed);
            return (Arc::clone(existing.value()), false);
        }

        match self.baselines.entry(key) {
            Entry::Occupied(occupied) => {
                occupied.get().last_observed.fetch_max(tick, Ordering::Relaxed);
                (Arc::clone(occupied.get()), false)
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(BaselineEntry {
                    stats: Mutex::new(RollingStats::new()),
                    last_observed: AtomicU64::new(tick),
                });
                vacant.insert(Arc::clone(&entry));
                (entry, true)
            }
        }
    }

    /// Drop least-recently-observed baselines until within capacity
    fn evict_if_needed(&self) {
        if self.max_keys == 0 {
            return;
        }

        while self.baselines.len() > self.max_keys {
            let oldest = self
                .baselines
                .iter()
                .min_by_key(|r| r.value().last_observed.load(Ordering::Relaxed))
                .map(|r| r.key().clone());

            let Some(key) = oldest else {
                break;
            };

            if self.baselines.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(
                    node_id = %key.node_id,
                    metric = %key.metric,
                    "Evicted least recently observed baseline"
                );
            }
        }
    }
}
