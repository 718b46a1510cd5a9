//! Compute-then-store wrapper run inside the mapper.

use std::path::PathBuf;

use gsw_config::{Configuration, StorageKey};
use gsw_core::errors::SweepError;
use gsw_pool::Task;
use gsw_store::ResultStore;
use serde::{Deserialize, Serialize};

/// One dispatched configuration and the store it must land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistJob {
    /// Result store root.
    pub root: PathBuf,
    /// Configuration to compute.
    pub config: Configuration,
}

/// Runs the wrapped compute task and writes its result to the store.
///
/// The write happens where the task runs (a worker process for a process
/// pool), so results never travel back through the pool. The output is the
/// key the result was written under.
#[derive(Debug, Clone)]
pub struct Persisting<T> {
    inner: T,
    name: String,
}

impl<T: Task<Input = Configuration>> Persisting<T> {
    /// Wraps `inner`; the task is named `persist:<inner name>`.
    pub fn new(inner: T) -> Self {
        let name = format!("persist:{}", inner.name());
        Self { inner, name }
    }

    /// The wrapped compute task.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Task<Input = Configuration>> Task for Persisting<T> {
    type Input = PersistJob;
    type Output = StorageKey;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, job: PersistJob) -> Result<StorageKey, SweepError> {
        let key = job.config.storage_key();
        let result = self
            .inner
            .run(job.config.clone())
            .map_err(|err| err.with_context("key", key.as_str()))?;
        ResultStore::open(&job.root)?.write(&key, &job.config, &result)?;
        Ok(key)
    }
}
