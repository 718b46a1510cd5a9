//! Scoped wall-clock timing of named phases.
//!
//! A [`PhaseTimer`] records its measurement exactly once: on [`PhaseTimer::finish`],
//! on [`PhaseTimer::fail`], or when it is dropped without either (early return via
//! `?`, or a panic unwinding through the scope).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How a timed phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseOutcome {
    /// The bracketed region returned normally.
    Completed,
    /// The bracketed region returned an error or was left early.
    Failed,
    /// The bracketed region panicked.
    Panicked,
}

/// A single recorded phase measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    /// Phase label, e.g. `experiments` or `plotting`.
    pub label: String,
    /// Elapsed wall-clock time.
    pub elapsed: Duration,
    /// Outcome of the bracketed region.
    pub outcome: PhaseOutcome,
}

/// Shared, cloneable collector of phase timings.
#[derive(Debug, Clone, Default)]
pub struct PhaseLog {
    entries: Arc<Mutex<Vec<PhaseTiming>>>,
}

impl PhaseLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, timing: PhaseTiming) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(timing);
        }
    }

    /// Returns a copy of every timing recorded so far, in recording order.
    pub fn snapshot(&self) -> Vec<PhaseTiming> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

/// Scoped timer for a named phase.
#[derive(Debug)]
pub struct PhaseTimer {
    label: String,
    start: Instant,
    log: Option<PhaseLog>,
    recorded: bool,
}

impl PhaseTimer {
    /// Starts timing a phase.
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        tracing::debug!(phase = %label, "phase started");
        Self {
            label,
            start: Instant::now(),
            log: None,
            recorded: false,
        }
    }

    /// Starts timing a phase whose measurement is also appended to `log`.
    pub fn start_logged(label: impl Into<String>, log: &PhaseLog) -> Self {
        let mut timer = Self::start(label);
        timer.log = Some(log.clone());
        timer
    }

    /// Phase label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Time elapsed since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Ends the phase successfully.
    pub fn finish(mut self) -> PhaseTiming {
        self.record(PhaseOutcome::Completed)
    }

    /// Ends the phase as failed.
    pub fn fail(mut self) -> PhaseTiming {
        self.record(PhaseOutcome::Failed)
    }

    fn record(&mut self, outcome: PhaseOutcome) -> PhaseTiming {
        self.recorded = true;
        let timing = PhaseTiming {
            label: self.label.clone(),
            elapsed: self.start.elapsed(),
            outcome,
        };
        match outcome {
            PhaseOutcome::Completed => tracing::info!(
                phase = %timing.label,
                elapsed_ms = timing.elapsed.as_millis() as u64,
                "phase finished"
            ),
            PhaseOutcome::Failed | PhaseOutcome::Panicked => tracing::warn!(
                phase = %timing.label,
                elapsed_ms = timing.elapsed.as_millis() as u64,
                outcome = ?outcome,
                "phase aborted"
            ),
        }
        if let Some(log) = &self.log {
            log.push(timing.clone());
        }
        timing
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        if !self.recorded {
            let outcome = if std::thread::panicking() {
                PhaseOutcome::Panicked
            } else {
                PhaseOutcome::Failed
            };
            self.record(outcome);
        }
    }
}

/// Runs `f` inside a timed phase, recording the outcome into `log`.
pub fn timed<T, E>(
    label: impl Into<String>,
    log: &PhaseLog,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let timer = PhaseTimer::start_logged(label, log);
    match f() {
        Ok(value) => {
            timer.finish();
            Ok(value)
        }
        Err(err) => {
            timer.fail();
            Err(err)
        }
    }
}
