//! Messages exchanged with worker processes, one JSON document per line.

use gsw_core::errors::SweepError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parent to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Run `task` on one encoded input.
    Run {
        /// Position of the input in the batch.
        index: usize,
        /// Registry name of the task.
        task: String,
        /// JSON-encoded input.
        payload: Value,
    },
    /// Finish the current loop and exit with status 0.
    Exit,
}

/// Worker to parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Sent once after start-up.
    Ready {
        /// Worker process id.
        pid: u32,
    },
    /// Outcome of one [`Request::Run`].
    Done {
        /// Echo of the request index.
        index: usize,
        /// Encoded output or the task's error.
        outcome: Outcome,
    },
}

/// Result of a single task invocation on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum Outcome {
    /// JSON-encoded output.
    Ok(Value),
    /// Structured task error.
    Err(SweepError),
}

impl From<Result<Value, SweepError>> for Outcome {
    fn from(result: Result<Value, SweepError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(err) => Outcome::Err(err),
        }
    }
}

impl From<Outcome> for Result<Value, SweepError> {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(err) => Err(err),
        }
    }
}

fn to_line<T: Serialize>(message: &T) -> Result<String, SweepError> {
    serde_json::to_string(message).map_err(|err| SweepError::serde("protocol_encode", err))
}

fn from_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, SweepError> {
    serde_json::from_str(line.trim()).map_err(|err| SweepError::serde("protocol_decode", err))
}

impl Request {
    /// Encodes the request as a single line (without terminator).
    pub fn to_line(&self) -> Result<String, SweepError> {
        to_line(self)
    }

    /// Decodes a request line.
    pub fn from_line(line: &str) -> Result<Self, SweepError> {
        from_line(line)
    }
}

impl Response {
    /// Encodes the response as a single line (without terminator).
    pub fn to_line(&self) -> Result<String, SweepError> {
        to_line(self)
    }

    /// Decodes a response line.
    pub fn from_line(line: &str) -> Result<Self, SweepError> {
        from_line(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_is_tagged() {
        let request = Request::Run {
            index: 3,
            task: "square".into(),
            payload: json!(7),
        };
        let line = request.to_line().expect("encode");
        assert!(line.contains("\"type\":\"run\""));
        assert!(!line.contains('\n'));
        assert_eq!(Request::from_line(&line).expect("decode"), request);
    }

    #[test]
    fn errors_cross_the_wire_unchanged() {
        let err = SweepError::compute("unlucky", "thirteen").with_context("input", "13");
        let response = Response::Done {
            index: 1,
            outcome: Outcome::Err(err.clone()),
        };
        let decoded = Response::from_line(&response.to_line().expect("encode")).expect("decode");
        match decoded {
            Response::Done { index, outcome } => {
                assert_eq!(index, 1);
                assert_eq!(Result::<Value, SweepError>::from(outcome), Err(err));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = Response::from_line("not json").expect_err("garbage");
        assert_eq!(err.info().code, "protocol_decode");
    }
}
