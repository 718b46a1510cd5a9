//! Worker side of the process pool.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use gsw_core::errors::{ErrorInfo, SweepError};
use gsw_core::serde::from_json_value;
use serde_json::Value;

use crate::process::{Outcome, Request, Response};
use crate::process::ipc::{LineReader, LineWriter};
use crate::task::{panic_error, Task};

type ErasedTask = Box<dyn Fn(Value) -> Result<Value, SweepError> + Send + Sync>;

/// Tasks a worker process can run, by name.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, ErasedTask>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` under its name, replacing any task of the same name.
    pub fn register<T: Task + 'static>(&mut self, task: T) -> &mut Self {
        let name = task.name().to_string();
        let erased: ErasedTask = Box::new(move |payload| {
            let input: T::Input = from_json_value(payload)?;
            let output = task.run(input)?;
            serde_json::to_value(output).map_err(|err| SweepError::serde("task_output", err))
        });
        self.tasks.insert(name, erased);
        self
    }

    /// Builder form of [`TaskRegistry::register`].
    pub fn with<T: Task + 'static>(mut self, task: T) -> Self {
        self.register(task);
        self
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Runs the named task on an encoded input.
    ///
    /// A panicking task is reported as [`SweepError::ComputeFailure`].
    pub fn run_json(&self, name: &str, payload: Value) -> Result<Value, SweepError> {
        let task = self.tasks.get(name).ok_or_else(|| {
            SweepError::ComputeFailure(
                ErrorInfo::new("unknown_task", format!("no task named `{name}` in this worker"))
                    .with_context("known", self.names().collect::<Vec<_>>().join(",")),
            )
        })?;
        catch_unwind(AssertUnwindSafe(|| task(payload)))
            .unwrap_or_else(|panic| Err(panic_error(name, panic.as_ref())))
    }
}

/// Answers requests from `input` on `output` until `Exit` or end of input.
///
/// Task output must never go to stdout: that stream carries the protocol.
pub fn serve<R: Read, W: Write>(registry: &TaskRegistry, input: R, output: W) -> io::Result<()> {
    let mut reader = LineReader::new(input);
    let mut writer = LineWriter::new(output);
    send(
        &mut writer,
        &Response::Ready {
            pid: std::process::id(),
        },
    )?;
    loop {
        let request = match reader.read_line()? {
            Some(line) => Request::from_line(line)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?,
            None => return Ok(()),
        };
        match request {
            Request::Exit => return Ok(()),
            Request::Run {
                index,
                task,
                payload,
            } => {
                let outcome = Outcome::from(registry.run_json(&task, payload));
                send(&mut writer, &Response::Done { index, outcome })?;
            }
        }
    }
}

fn send<W: Write>(writer: &mut LineWriter<W>, response: &Response) -> io::Result<()> {
    let line = response
        .to_line()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    writer.write_line(&line)
}

/// Serves requests on stdin/stdout and exits the process.
pub fn run_worker_main(registry: &TaskRegistry) -> ! {
    // Pipe errors surface as io::Error instead of killing the worker.
    // SAFETY: installing SIG_IGN does not run any handler code.
    unsafe {
        let _ = nix::sys::signal::signal(
            nix::sys::signal::Signal::SIGPIPE,
            nix::sys::signal::SigHandler::SigIgn,
        );
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    match serve(registry, stdin.lock(), stdout.lock()) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = %err, "worker loop failed");
            std::process::exit(1);
        }
    }
}
