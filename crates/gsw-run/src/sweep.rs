//! Idempotent dispatch of pending configurations.

use std::collections::{BTreeMap, BTreeSet};

use gsw_config::{Configuration, StorageKey};
use gsw_core::errors::SweepError;
use gsw_pool::{Mapper, Task};
use gsw_store::ResultStore;
use serde::{Deserialize, Serialize};

use crate::persist::{PersistJob, Persisting};

/// Options for [`run_sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOpts {
    /// Recompute configurations whose results are already stored.
    pub force: bool,
}

/// Counters describing one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Configurations passed in.
    pub requested: usize,
    /// Distinct storage keys among them.
    pub unique: usize,
    /// Keys served from the store without dispatch.
    pub cached: usize,
    /// Keys computed and written during this sweep.
    pub computed: usize,
    /// Keys that ended with an error.
    pub failed: usize,
}

/// A configuration that produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// Key of the configuration.
    pub key: StorageKey,
    /// The configuration itself; empty when its stored envelope could not
    /// be read.
    pub config: Configuration,
    /// What went wrong.
    pub error: SweepError,
}

/// Cache hits and fresh results of a sweep, plus its failures.
///
/// Entries are keyed by storage key; no other ordering is implied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet<R> {
    /// Successful results.
    pub entries: BTreeMap<StorageKey, (Configuration, R)>,
    /// Per-configuration failures.
    pub failures: Vec<SweepFailure>,
    /// Counters.
    pub stats: SweepStats,
}

impl<R> ResultSet<R> {
    /// Number of successful results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no result succeeded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every requested configuration has a result.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Result for `key`, if it succeeded.
    pub fn get(&self, key: &StorageKey) -> Option<&R> {
        self.entries.get(key).map(|(_, result)| result)
    }

    /// Configurations with a result.
    pub fn configs(&self) -> impl Iterator<Item = &Configuration> {
        self.entries.values().map(|(config, _)| config)
    }
}

/// Computes every configuration not yet in `store` and returns all results.
///
/// Duplicate configurations collapse onto one key. Pending work goes
/// through `mapper` as [`Persisting`] jobs, so results are written by whoever
/// computed them; afterwards every requested key is read back from the
/// store. A compute, store or decode error only fails its own
/// configuration. An `Err` from the mapper itself (a dead worker) aborts the
/// sweep; results written before the abort stay in the store.
pub fn run_sweep<T, M>(
    configs: &[Configuration],
    compute: &T,
    store: &ResultStore,
    mapper: &M,
    opts: &SweepOpts,
) -> Result<ResultSet<T::Output>, SweepError>
where
    T: Task<Input = Configuration>,
    M: Mapper,
{
    let mut unique: BTreeMap<StorageKey, Configuration> = BTreeMap::new();
    for config in configs {
        unique
            .entry(config.storage_key())
            .or_insert_with(|| config.clone());
    }
    let pending: Vec<(&StorageKey, &Configuration)> = unique
        .iter()
        .filter(|(key, _)| opts.force || !store.exists(key))
        .collect();

    let mut stats = SweepStats {
        requested: configs.len(),
        unique: unique.len(),
        cached: unique.len() - pending.len(),
        ..SweepStats::default()
    };
    tracing::info!(
        requested = stats.requested,
        unique = stats.unique,
        cached = stats.cached,
        pending = pending.len(),
        mapper = %mapper.describe(),
        "dispatching sweep"
    );

    let mut failures = Vec::new();
    let mut failed: BTreeSet<StorageKey> = BTreeSet::new();
    if !pending.is_empty() {
        let jobs: Vec<PersistJob> = pending
            .iter()
            .map(|(_, config)| PersistJob {
                root: store.root().to_path_buf(),
                config: (*config).clone(),
            })
            .collect();
        let slots = mapper.map(&Persisting::new(compute), jobs)?;
        for ((key, config), slot) in pending.iter().zip(slots) {
            match slot {
                Ok(_) => {
                    tracing::debug!(key = %key, "computed");
                    stats.computed += 1;
                }
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "configuration failed");
                    failed.insert((*key).clone());
                    failures.push(SweepFailure {
                        key: (*key).clone(),
                        config: (*config).clone(),
                        error,
                    });
                }
            }
        }
    }

    let mut entries = BTreeMap::new();
    for (key, config) in &unique {
        if failed.contains(key) {
            continue;
        }
        match store.read::<T::Output>(key) {
            Ok(stored) => {
                entries.insert(key.clone(), (stored.config, stored.result));
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "stored result unreadable");
                failures.push(SweepFailure {
                    key: key.clone(),
                    config: config.clone(),
                    error,
                });
            }
        }
    }
    stats.failed = failures.len();
    tracing::info!(
        results = entries.len(),
        computed = stats.computed,
        failed = stats.failed,
        "sweep finished"
    );
    Ok(ResultSet {
        entries,
        failures,
        stats,
    })
}
