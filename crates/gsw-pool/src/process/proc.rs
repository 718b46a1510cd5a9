//! Handle on one worker process and its pipes.

use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use gsw_core::errors::{ErrorInfo, SweepError};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::Value;

use super::ipc::{LineReader, LineWriter};
use super::protocol::{Request, Response};
use super::signals::TerminationReason;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const TERM_GRACE: Duration = Duration::from_millis(100);

/// A spawned worker speaking the line protocol on stdin/stdout.
pub struct WorkerProc {
    id: usize,
    child: Child,
    writer: Option<LineWriter<ChildStdin>>,
    reader: LineReader<ChildStdout>,
    status: Option<TerminationReason>,
    jobs: usize,
}

impl WorkerProc {
    /// Spawns `command` with piped stdin/stdout and inherited stderr.
    pub fn spawn(id: usize, mut command: Command) -> Result<Self, SweepError> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let mut child = command.spawn().map_err(|err| {
            SweepError::PoolFailure(
                ErrorInfo::new("spawn_failed", err.to_string())
                    .with_context("worker", id.to_string())
                    .with_context("program", format!("{:?}", command.get_program())),
            )
        })?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SweepError::pool("spawn_failed", "worker pipes were not captured"));
        };
        Ok(Self {
            id,
            child,
            writer: Some(LineWriter::new(stdin)),
            reader: LineReader::new(stdout),
            status: None,
            jobs: 0,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Waits for the start-up `Ready` message.
    pub fn wait_ready(&mut self) -> Result<(), SweepError> {
        match self.recv()? {
            Some(Response::Ready { .. }) => Ok(()),
            Some(other) => Err(self.protocol_error(format!("expected ready, got {other:?}"))),
            None => Err(self.died("starting up")),
        }
    }

    /// Runs one input on the worker and returns its encoded outcome.
    pub fn call(&mut self, task: &str, index: usize, payload: Value) -> Result<Result<Value, SweepError>, SweepError> {
        let request = Request::Run {
            index,
            task: task.to_string(),
            payload,
        };
        if self.send(&request).is_err() {
            return Err(self.died("receiving a job").with_context("index", index.to_string()));
        }
        match self.recv()? {
            Some(Response::Done {
                index: echoed,
                outcome,
            }) if echoed == index => {
                self.jobs += 1;
                Ok(outcome.into())
            }
            Some(other) => Err(self.protocol_error(format!("expected done for {index}, got {other:?}"))),
            None => Err(self.died("running a job").with_context("index", index.to_string())),
        }
    }

    fn send(&mut self, request: &Request) -> Result<(), SweepError> {
        let line = request.to_line()?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SweepError::pool("worker_closed", "worker stdin already closed"))?;
        writer
            .write_line(&line)
            .map_err(|err| SweepError::pool("worker_send", err.to_string()))
    }

    fn recv(&mut self) -> Result<Option<Response>, SweepError> {
        let line = match self.reader.read_line() {
            Ok(Some(line)) => line.to_string(),
            Ok(None) => return Ok(None),
            Err(err) => {
                tracing::debug!(worker = self.id, error = %err, "worker read failed");
                return Ok(None);
            }
        };
        Response::from_line(&line)
            .map(Some)
            .map_err(|err| self.protocol_error(err.info().message.clone()))
    }

    fn protocol_error(&self, message: String) -> SweepError {
        SweepError::PoolFailure(
            ErrorInfo::new("malformed_response", message)
                .with_context("worker", self.id.to_string())
                .with_context("pid", self.pid().to_string()),
        )
    }

    /// Builds the error for a worker that stopped talking, naming how it ended.
    fn died(&mut self, doing: &str) -> SweepError {
        let reason = self.reason_within(Duration::from_secs(1));
        tracing::warn!(
            worker = self.id,
            pid = self.pid(),
            reason = %reason,
            jobs = self.jobs,
            "worker died while {doing}"
        );
        SweepError::PoolFailure(
            ErrorInfo::new("worker_died", format!("worker {} {reason} while {doing}", self.id))
                .with_context("worker", self.id.to_string())
                .with_context("pid", self.pid().to_string())
                .with_context("reason", reason.to_string()),
        )
    }

    fn try_wait(&mut self) -> Option<TerminationReason> {
        if self.status.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.status = Some(status.into());
            }
        }
        self.status
    }

    fn reason_within(&mut self, timeout: Duration) -> TerminationReason {
        let start = Instant::now();
        loop {
            if let Some(reason) = self.try_wait() {
                return reason;
            }
            if start.elapsed() >= timeout {
                return TerminationReason::StillAlive;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Asks the worker to exit, then escalates to SIGTERM and SIGKILL.
    ///
    /// The process is always reaped when this returns.
    pub fn stop(&mut self, grace: Duration) -> TerminationReason {
        if let Some(reason) = self.status {
            return reason;
        }
        if self.writer.is_some() {
            let _ = self.send(&Request::Exit);
        }
        // Closing stdin also ends a worker that missed the exit message.
        self.writer = None;
        let reason = self.reason_within(grace);
        if reason != TerminationReason::StillAlive {
            return reason;
        }

        let pid = Pid::from_raw(self.child.id() as i32);
        let _ = signal::kill(pid, Signal::SIGTERM);
        let reason = self.reason_within(TERM_GRACE);
        if reason != TerminationReason::StillAlive {
            return reason;
        }

        tracing::warn!(worker = self.id, pid = self.pid(), "worker ignored SIGTERM, killing");
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => {
                let reason = TerminationReason::from(status);
                self.status = Some(reason);
                reason
            }
            Err(_) => TerminationReason::StillAlive,
        }
    }
}

impl Drop for WorkerProc {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill();
            if let Ok(status) = self.child.wait() {
                self.status = Some(status.into());
            }
        }
    }
}
