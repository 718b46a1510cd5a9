//! Why a worker process stopped.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::signal::Signal;

/// Termination reason of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with a status code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(Signal),
    /// Killed by a signal number `nix` does not know.
    UnknownSignal(i32),
    /// The process had not exited when last checked.
    StillAlive,
}

impl TerminationReason {
    /// Whether the worker exited cleanly.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<ExitStatus> for TerminationReason {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        match status.signal() {
            Some(raw) => Signal::try_from(raw)
                .map(Self::Signaled)
                .unwrap_or(Self::UnknownSignal(raw)),
            None => Self::UnknownSignal(0),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(Signal::SIGSEGV) => write!(f, "killed by SIGSEGV (stack overflow?)"),
            Self::Signaled(Signal::SIGKILL) => write!(f, "killed by SIGKILL (out of memory?)"),
            Self::Signaled(signal) => write!(f, "killed by {signal}"),
            Self::UnknownSignal(raw) => write!(f, "killed by signal {raw}"),
            Self::StillAlive => write!(f, "still running"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_and_signals_are_decoded() {
        assert_eq!(
            TerminationReason::from(ExitStatus::from_raw(0)),
            TerminationReason::Exited(0)
        );
        assert_eq!(
            TerminationReason::from(ExitStatus::from_raw(3 << 8)),
            TerminationReason::Exited(3)
        );
        assert_eq!(
            TerminationReason::from(ExitStatus::from_raw(Signal::SIGABRT as i32)),
            TerminationReason::Signaled(Signal::SIGABRT)
        );
    }

    #[test]
    fn descriptions_name_the_cause() {
        assert!(TerminationReason::Exited(0).is_success());
        assert!(!TerminationReason::Exited(1).is_success());
        assert_eq!(
            TerminationReason::Signaled(Signal::SIGABRT).to_string(),
            "killed by SIGABRT"
        );
        assert!(TerminationReason::Signaled(Signal::SIGKILL)
            .to_string()
            .contains("out of memory"));
    }
}
