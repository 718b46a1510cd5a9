//! The `map` contract and its in-process implementations.

use gsw_core::errors::SweepError;
use rayon::prelude::*;

use crate::process::ProcessPool;
use crate::task::{run_caught, Task};

/// Output of one `map` call: one slot per input, in input order.
pub type Slots<O> = Vec<Result<O, SweepError>>;

/// Runs a task over a batch of inputs.
///
/// Every implementation evaluates the whole batch: an input whose task
/// fails (or panics) fills its own slot with the error and the remaining
/// inputs still run. The outer `Err` is reserved for failures of the
/// mapper itself, such as a worker process dying.
pub trait Mapper {
    /// Runs `task` over `inputs` and returns the slots in input order.
    fn map<T: Task>(&self, task: &T, inputs: Vec<T::Input>) -> Result<Slots<T::Output>, SweepError>;

    /// Short label used in logs and reports.
    fn describe(&self) -> String;
}

/// Runs every input in order on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialMapper;

impl Mapper for SerialMapper {
    fn map<T: Task>(&self, task: &T, inputs: Vec<T::Input>) -> Result<Slots<T::Output>, SweepError> {
        Ok(inputs
            .into_iter()
            .map(|input| run_caught(task, input))
            .collect())
    }

    fn describe(&self) -> String {
        "serial".to_string()
    }
}

/// Runs inputs on a `rayon` thread pool sized at call time.
#[derive(Debug, Clone, Copy)]
pub struct ThreadMapper {
    threads: usize,
}

impl ThreadMapper {
    /// Mapper with `threads` worker threads (at least one).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl Mapper for ThreadMapper {
    fn map<T: Task>(&self, task: &T, inputs: Vec<T::Input>) -> Result<Slots<T::Output>, SweepError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|err| SweepError::pool("thread_pool", err.to_string()))?;
        Ok(pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| run_caught(task, input))
                .collect()
        }))
    }

    fn describe(&self) -> String {
        format!("thread({})", self.threads)
    }
}

/// Mapper picked at runtime.
#[derive(Debug, Clone)]
pub enum AnyMapper {
    /// In order, on the calling thread.
    Serial(SerialMapper),
    /// On a thread pool.
    Thread(ThreadMapper),
    /// On worker processes.
    Process(ProcessPool),
}

impl Mapper for AnyMapper {
    fn map<T: Task>(&self, task: &T, inputs: Vec<T::Input>) -> Result<Slots<T::Output>, SweepError> {
        match self {
            AnyMapper::Serial(mapper) => mapper.map(task, inputs),
            AnyMapper::Thread(mapper) => mapper.map(task, inputs),
            AnyMapper::Process(mapper) => mapper.map(task, inputs),
        }
    }

    fn describe(&self) -> String {
        match self {
            AnyMapper::Serial(mapper) => mapper.describe(),
            AnyMapper::Thread(mapper) => mapper.describe(),
            AnyMapper::Process(mapper) => mapper.describe(),
        }
    }
}

impl From<SerialMapper> for AnyMapper {
    fn from(mapper: SerialMapper) -> Self {
        AnyMapper::Serial(mapper)
    }
}

impl From<ThreadMapper> for AnyMapper {
    fn from(mapper: ThreadMapper) -> Self {
        AnyMapper::Thread(mapper)
    }
}

impl From<ProcessPool> for AnyMapper {
    fn from(mapper: ProcessPool) -> Self {
        AnyMapper::Process(mapper)
    }
}
