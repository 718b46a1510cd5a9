//! Worker binary used by the process pool integration tests.
//!
//! `gsw-pool-probe worker` serves the probe tasks; `gsw-pool-probe linger`
//! sleeps for a minute and stands in for a stray descendant.

use std::process::{self, Command, Stdio};
use std::thread;
use std::time::Duration;

use gsw_core::errors::SweepError;
use gsw_pool::{
    pool_depth, run_worker_main, FnTask, Mapper, ProcessPool, TaskRegistry, WorkerCommand,
};

fn square(x: i64) -> Result<i64, SweepError> {
    if x == 13 {
        return Err(SweepError::compute("unlucky", "thirteen is rejected"));
    }
    Ok(x * x)
}

fn spawn_lingerer() -> Result<u32, SweepError> {
    let exe = std::env::current_exe().map_err(|err| SweepError::compute("current_exe", err.to_string()))?;
    let child = Command::new(exe)
        .arg("linger")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|err| SweepError::compute("spawn_lingerer", err.to_string()))?;
    Ok(child.id())
}

/// Runs a nested pool and returns the pids of its workers and of the
/// lingerers they left behind.
fn nested(width: usize) -> Result<Vec<u32>, SweepError> {
    let pool = ProcessPool::new(width, WorkerCommand::current_exe(["worker"])?);
    let mut pids = Vec::new();
    for slot in pool.map(&pid_task(), vec![(); width])? {
        pids.push(slot?);
    }
    for slot in pool.map(&linger_task(), vec![(); width])? {
        pids.push(slot?);
    }
    Ok(pids)
}

/// Runs a nested pool of lingerers and reports which are still alive once
/// that inner `map` has returned.
fn nested_leftovers(width: usize) -> Result<Vec<(u32, bool)>, SweepError> {
    let pool = ProcessPool::new(width, WorkerCommand::current_exe(["worker"])?);
    let mut pids = Vec::new();
    for slot in pool.map(&linger_task(), vec![(); width])? {
        pids.push(slot?);
    }
    Ok(pids.into_iter().map(|pid| (pid, is_running(pid))).collect())
}

fn is_running(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(") ")
                .and_then(|(_, rest)| rest.chars().next())
        })
        .map_or(false, |state| state != 'Z' && state != 'X')
}

fn pid_task() -> impl gsw_pool::Task<Input = (), Output = u32> {
    FnTask::new("pid", |_: ()| {
        // Keeps every worker busy long enough to receive one job each.
        thread::sleep(Duration::from_millis(50));
        Ok::<_, SweepError>(process::id())
    })
}

fn linger_task() -> impl gsw_pool::Task<Input = (), Output = u32> {
    FnTask::new("linger", |_: ()| spawn_lingerer())
}

fn registry() -> TaskRegistry {
    TaskRegistry::new()
        .with(FnTask::new("square", square))
        .with(FnTask::new("panic", |_: i64| -> Result<i64, SweepError> {
            panic!("probe panic")
        }))
        .with(FnTask::new("abort", |x: i64| -> Result<i64, SweepError> {
            if x < 0 {
                process::abort();
            }
            thread::sleep(Duration::from_millis(20));
            Ok(x)
        }))
        .with(FnTask::new("depth", |_: ()| Ok::<_, SweepError>(pool_depth())))
        .with(pid_task())
        .with(linger_task())
        .with(FnTask::new("nested", nested))
        .with(FnTask::new("nested_leftovers", nested_leftovers))
}

fn main() {
    match std::env::args().nth(1).as_deref() {
        Some("worker") => run_worker_main(&registry()),
        Some("linger") => thread::sleep(Duration::from_secs(60)),
        _ => {
            eprintln!("usage: gsw-pool-probe worker|linger");
            process::exit(2);
        }
    }
}
