//! Nested-safe pool of OS worker processes.
//!
//! ```text
//!                  map(task, inputs)
//!                         |
//!          +--------------+--------------+
//!          |              |              |
//!     feeder 0       feeder 1       feeder N        (threads, shared queue)
//!          |              |              |
//!     worker 0       worker 1       worker N        (processes, JSON lines)
//!          |
//!     nested pool / helpers                          (same process group)
//! ```
//!
//! Workers are ordinary processes started from a [`WorkerCommand`] and may
//! start their own pools. The outermost pool (depth 0) places each worker
//! in a fresh process group; nested pools leave their workers in the
//! inherited group. When a root pool tears down it kills every group it
//! created and waits for the group to empty, which takes transitively
//! spawned descendants with it.

pub(crate) mod ipc;
mod proc;
mod protocol;
mod signals;

use std::collections::VecDeque;
use std::env;
use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use gsw_core::errors::SweepError;
use gsw_core::serde::from_json_value;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use serde_json::Value;

use crate::mapper::{Mapper, Slots};
use crate::task::Task;

pub use protocol::{Outcome, Request, Response};
pub use signals::TerminationReason;

use proc::WorkerProc;

/// Environment variable holding the pool nesting depth of a process.
pub const POOL_DEPTH_ENV: &str = "GSW_POOL_DEPTH";

const DEFAULT_GRACE: Duration = Duration::from_secs(2);
const GROUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool nesting depth of the current process: 0 outside any pool worker.
pub fn pool_depth() -> u32 {
    env::var(POOL_DEPTH_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(0)
}

/// Whether the current process was started as a pool worker.
pub fn is_pool_worker() -> bool {
    pool_depth() > 0
}

/// Program and arguments that start a worker speaking the line protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Runs `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-runs the current executable with `args`.
    pub fn current_exe<S: Into<OsString>>(args: impl IntoIterator<Item = S>) -> Result<Self, SweepError> {
        let program = env::current_exe()
            .map_err(|err| SweepError::pool("current_exe", err.to_string()))?;
        Ok(Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, depth: u32) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).env(POOL_DEPTH_ENV, (depth + 1).to_string());
        if depth == 0 {
            command.process_group(0);
        }
        command
    }
}

/// Nested-safe process pool.
///
/// Each [`Mapper::map`] call starts `min(workers, inputs)` processes, feeds
/// them inputs from a shared queue and tears them down before returning,
/// whether the batch succeeded, failed or panicked.
///
/// Only a root pool (depth 0) cleans up descendants. A nested pool joins its
/// own workers, but anything those workers spawned and left running stays in
/// the inherited process group until the root pool's `map` drains it. No
/// process outlives the outermost `map` call.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    workers: usize,
    command: WorkerCommand,
    grace: Duration,
}

impl ProcessPool {
    /// Pool of up to `workers` processes started with `command`.
    pub fn new(workers: usize, command: WorkerCommand) -> Self {
        Self {
            workers: workers.max(1),
            command,
            grace: DEFAULT_GRACE,
        }
    }

    /// How long a worker may take to exit after being asked to.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Maximum number of worker processes.
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Mapper for ProcessPool {
    fn map<T: Task>(&self, task: &T, inputs: Vec<T::Input>) -> Result<Slots<T::Output>, SweepError> {
        let mut slots: Vec<Option<Result<Value, SweepError>>> = Vec::with_capacity(inputs.len());
        let mut queue = VecDeque::new();
        for (index, input) in inputs.into_iter().enumerate() {
            match serde_json::to_value(&input) {
                Ok(payload) => {
                    slots.push(None);
                    queue.push_back((index, payload));
                }
                Err(err) => slots.push(Some(Err(SweepError::serde("task_input", err)))),
            }
        }
        if !queue.is_empty() {
            let depth = pool_depth();
            let mut session = Session::start(self, queue.len(), depth)?;
            for (index, outcome) in session.run(task.name(), queue)? {
                slots[index] = Some(outcome);
            }
            session.shutdown();
        }

        Ok(slots
            .into_iter()
            .map(|slot| match slot {
                Some(Ok(value)) => from_json_value(value),
                Some(Err(err)) => Err(err),
                None => Err(SweepError::pool("slot_unfilled", "no worker reported this input")),
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("process({})", self.workers)
    }
}

/// Workers of one `map` call. Dropping the session tears them down.
struct Session {
    procs: Vec<WorkerProc>,
    groups: Vec<Pid>,
    grace: Duration,
    depth: u32,
    closed: bool,
}

impl Session {
    fn start(pool: &ProcessPool, jobs: usize, depth: u32) -> Result<Self, SweepError> {
        let count = pool.workers.min(jobs);
        let mut session = Session {
            procs: Vec::with_capacity(count),
            groups: Vec::new(),
            grace: pool.grace,
            depth,
            closed: false,
        };
        if depth == 0 {
            adopt_orphans();
        }
        for id in 0..count {
            let proc = WorkerProc::spawn(id, pool.command.command(depth))?;
            if depth == 0 {
                session.groups.push(Pid::from_raw(proc.pid() as i32));
            }
            session.procs.push(proc);
        }
        for proc in &mut session.procs {
            proc.wait_ready()?;
        }
        tracing::info!(workers = count, jobs, depth, "process pool started");
        Ok(session)
    }

    /// Feeds the queue to the workers until it is empty or a worker dies.
    fn run(
        &mut self,
        task: &str,
        queue: VecDeque<(usize, Value)>,
    ) -> Result<Vec<(usize, Result<Value, SweepError>)>, SweepError> {
        let queue = Mutex::new(queue);
        let done = Mutex::new(Vec::new());
        let fatal: Mutex<Option<SweepError>> = Mutex::new(None);
        let abort = AtomicBool::new(false);

        thread::scope(|scope| {
            for proc in self.procs.iter_mut() {
                let (queue, done, fatal, abort) = (&queue, &done, &fatal, &abort);
                scope.spawn(move || loop {
                    if abort.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                    let Some((index, payload)) = next else {
                        break;
                    };
                    tracing::debug!(task, index, pid = proc.pid(), "dispatching job");
                    match proc.call(task, index, payload) {
                        Ok(outcome) => done
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((index, outcome)),
                        Err(err) => {
                            abort.store(true, Ordering::SeqCst);
                            fatal
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .get_or_insert(err);
                            break;
                        }
                    }
                });
            }
        });

        if let Some(err) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(err.with_context("task", task));
        }
        Ok(done.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for proc in &mut self.procs {
            let reason = proc.stop(self.grace);
            if !reason.is_success() {
                tracing::debug!(pid = proc.pid(), reason = %reason, "worker stopped");
            }
        }
        for group in &self.groups {
            drain_group(*group);
        }
        tracing::debug!(workers = self.procs.len(), depth = self.depth, "process pool stopped");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Kills every process left in `group` and waits until none remain.
fn drain_group(group: Pid) {
    let _ = killpg(group, Signal::SIGKILL);
    let start = Instant::now();
    loop {
        match killpg(group, None) {
            Err(Errno::ESRCH) => return,
            Err(err) => {
                tracing::debug!(group = group.as_raw(), error = %err, "cannot probe process group");
                return;
            }
            Ok(()) if start.elapsed() >= GROUP_DRAIN_TIMEOUT => {
                tracing::warn!(group = group.as_raw(), "process group still populated after teardown");
                return;
            }
            Ok(()) => {
                reap_group(group);
                thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

/// Reaps members of `group` that were re-parented to this process.
fn reap_group(group: Pid) {
    let members = Pid::from_raw(-group.as_raw());
    while let Ok(status) = waitpid(members, Some(WaitPidFlag::WNOHANG)) {
        if status == WaitStatus::StillAlive {
            break;
        }
    }
}

/// Makes orphaned descendants re-parent to this process instead of init,
/// so a root pool can reap them itself.
#[cfg(target_os = "linux")]
fn adopt_orphans() {
    if let Err(err) = nix::sys::prctl::set_child_subreaper(true) {
        tracing::debug!(error = %err, "cannot become child subreaper");
    }
}

#[cfg(not(target_os = "linux"))]
fn adopt_orphans() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_workers_get_depth_one() {
        let command = WorkerCommand::new("/bin/true").arg("worker").command(0);
        let depth = command
            .get_envs()
            .find(|(name, _)| *name == POOL_DEPTH_ENV)
            .and_then(|(_, value)| value)
            .map(|value| value.to_string_lossy().into_owned());
        assert_eq!(depth.as_deref(), Some("1"));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["worker"]);
    }

    #[test]
    fn describe_names_worker_count() {
        let pool = ProcessPool::new(0, WorkerCommand::new("/bin/true"));
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.describe(), "process(1)");
    }
}
