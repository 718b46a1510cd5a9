//! Structured error types shared across GSW crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SweepError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (option names, keys, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sweep runner.
///
/// Errors are serializable so a pool worker can hand a structured failure
/// back to its parent process without losing the family or the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SweepError {
    /// Schema or arbitration failure while decoding a configuration.
    #[error("config invalid: {0}")]
    ConfigInvalid(ErrorInfo),
    /// The compute (or render) function failed for one input.
    #[error("compute failure: {0}")]
    ComputeFailure(ErrorInfo),
    /// Reading or writing the result store failed.
    #[error("store io error: {0}")]
    StoreIo(ErrorInfo),
    /// A requested result is not present in the store.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// A worker died without reporting a structured error.
    #[error("pool failure: {0}")]
    PoolFailure(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SweepError {
    /// Shorthand for a [`SweepError::ConfigInvalid`] error.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        SweepError::ConfigInvalid(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SweepError::ComputeFailure`] error.
    pub fn compute(code: &str, message: impl Into<String>) -> Self {
        SweepError::ComputeFailure(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SweepError::StoreIo`] error built from any displayable cause.
    pub fn store_io(code: &str, err: impl ToString) -> Self {
        SweepError::StoreIo(ErrorInfo::new(code, err.to_string()))
    }

    /// Shorthand for a [`SweepError::PoolFailure`] error.
    pub fn pool(code: &str, message: impl Into<String>) -> Self {
        SweepError::PoolFailure(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`SweepError::Serde`] error built from any displayable cause.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        SweepError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SweepError::ConfigInvalid(info)
            | SweepError::ComputeFailure(info)
            | SweepError::StoreIo(info)
            | SweepError::NotFound(info)
            | SweepError::PoolFailure(info)
            | SweepError::Serde(info) => info,
        }
    }

    /// Adds a context entry to the wrapped payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let info = match &mut self {
            SweepError::ConfigInvalid(info)
            | SweepError::ComputeFailure(info)
            | SweepError::StoreIo(info)
            | SweepError::NotFound(info)
            | SweepError::PoolFailure(info)
            | SweepError::Serde(info) => info,
        };
        info.context.insert(key.into(), value.into());
        self
    }

    /// Stable family label, matching the serialized `family` tag.
    pub fn family(&self) -> &'static str {
        match self {
            SweepError::ConfigInvalid(_) => "ConfigInvalid",
            SweepError::ComputeFailure(_) => "ComputeFailure",
            SweepError::StoreIo(_) => "StoreIo",
            SweepError::NotFound(_) => "NotFound",
            SweepError::PoolFailure(_) => "PoolFailure",
            SweepError::Serde(_) => "Serde",
        }
    }

    /// Whether the error aborts the whole batch instead of a single slot.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, SweepError::PoolFailure(_))
    }
}
