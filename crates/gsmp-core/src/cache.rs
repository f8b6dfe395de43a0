//! Memo of derived approximations shared by all reductions of a model.
//!
//! Two tables: Weibull density surrogates keyed by (kind, params, epsilon),
//! and Poisson mixtures keyed additionally by the uniformization rate. Keys
//! compare parameter bit patterns, so only exact repeats hit. When a table
//! reaches its bound it is cleared wholesale.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use gsmp_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::distribution::{DistributionKind, DistributionParams};
use crate::logging::{event_names, Stage};
use crate::strategy::weibull::WeibullSurrogate;
use crate::transient::PoissonMixture;

/// Exact-match key of one derived approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApproximationKey {
    kind: DistributionKind,
    params: [u64; 2],
    epsilon: u64,
    rate: Option<u64>,
}

impl ApproximationKey {
    /// Key independent of the uniformization rate.
    pub fn new(params: &DistributionParams, epsilon: f64) -> Self {
        Self {
            kind: params.kind(),
            params: params.key_bits(),
            epsilon: epsilon.to_bits(),
            rate: None,
        }
    }

    /// Key for a mixture computed at uniformization rate `q`.
    pub fn with_rate(self, q: f64) -> Self {
        Self {
            rate: Some(q.to_bits()),
            ..self
        }
    }

    pub fn kind(&self) -> DistributionKind {
        self.kind
    }
}

/// Hit/miss counters and table sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub surrogates: usize,
    pub mixtures: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe approximation memo.
#[derive(Debug)]
pub struct ApproximationCache {
    surrogates: RwLock<HashMap<ApproximationKey, Arc<WeibullSurrogate>>>,
    mixtures: RwLock<HashMap<ApproximationKey, Arc<PoissonMixture>>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ApproximationCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            surrogates: RwLock::new(HashMap::new()),
            mixtures: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached surrogate for `key`, building it with `build` on a miss.
    pub fn surrogate(
        &self,
        key: ApproximationKey,
        build: impl FnOnce() -> Result<WeibullSurrogate>,
    ) -> Result<Arc<WeibullSurrogate>> {
        self.get_or_insert(&self.surrogates, "surrogates", key, build)
    }

    /// Cached Poisson mixture for `key`, building it with `build` on a miss.
    pub fn mixture(
        &self,
        key: ApproximationKey,
        build: impl FnOnce() -> Result<PoissonMixture>,
    ) -> Result<Arc<PoissonMixture>> {
        self.get_or_insert(&self.mixtures, "mixtures", key, build)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            surrogates: self.surrogates.read().map(|t| t.len()).unwrap_or(0),
            mixtures: self.mixtures.read().map(|t| t.len()).unwrap_or(0),
        }
    }

    /// Drop every entry; counters are kept.
    pub fn clear(&self) {
        if let Ok(mut table) = self.surrogates.write() {
            table.clear();
        }
        if let Ok(mut table) = self.mixtures.write() {
            table.clear();
        }
    }

    fn get_or_insert<V>(
        &self,
        table: &RwLock<HashMap<ApproximationKey, Arc<V>>>,
        name: &str,
        key: ApproximationKey,
        build: impl FnOnce() -> Result<V>,
    ) -> Result<Arc<V>> {
        {
            let guard = table.read().map_err(|_| poisoned(name))?;
            if let Some(value) = guard.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(value));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Built outside the lock: two workers may race on the same key, and
        // the second insert simply replaces an equal value.
        let value = Arc::new(build()?);
        let mut guard = table.write().map_err(|_| poisoned(name))?;
        if guard.len() >= self.max_entries && !guard.contains_key(&key) {
            warn!(
                target: event_names::APPROX_CACHE_EVICTED,
                stage = %Stage::Reduce,
                table = name,
                entries = guard.len(),
                "approximation cache full, clearing"
            );
            guard.clear();
        }
        guard.insert(key, Arc::clone(&value));
        Ok(value)
    }
}

impl Default for ApproximationCache {
    fn default() -> Self {
        Self::new(gsmp_config::CacheConfig::default().max_approximations)
    }
}

fn poisoned(table: &str) -> Error {
    Error::NumericalInstability(format!("approximation cache {table} lock poisoned"))
}
