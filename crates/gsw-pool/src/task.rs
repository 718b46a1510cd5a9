//! Named, typed units of work that a mapper can run in or out of process.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};

use gsw_core::errors::{ErrorInfo, SweepError};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A function over serializable inputs.
///
/// The name identifies the task across the process boundary: a worker
/// process resolves it through its [`TaskRegistry`](crate::TaskRegistry), so
/// every task handed to a [`ProcessPool`](crate::ProcessPool) must be
/// registered under the same name in the worker binary.
pub trait Task: Send + Sync {
    /// Input of one invocation.
    type Input: Serialize + DeserializeOwned + Send;
    /// Output of one invocation.
    type Output: Serialize + DeserializeOwned + Send;

    /// Registry name of the task.
    fn name(&self) -> &str;

    /// Runs the task for a single input.
    fn run(&self, input: Self::Input) -> Result<Self::Output, SweepError>;
}

impl<T: Task + ?Sized> Task for &T {
    type Input = T::Input;
    type Output = T::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, input: Self::Input) -> Result<Self::Output, SweepError> {
        (**self).run(input)
    }
}

/// Adapts a closure into a [`Task`].
pub struct FnTask<I, O, F> {
    name: String,
    func: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnTask<I, O, F>
where
    F: Fn(I) -> Result<O, SweepError> + Send + Sync,
{
    /// Wraps `func` under `name`.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _marker: PhantomData,
        }
    }
}

impl<I, O, F> fmt::Debug for FnTask<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

impl<I, O, F> Task for FnTask<I, O, F>
where
    I: Serialize + DeserializeOwned + Send,
    O: Serialize + DeserializeOwned + Send,
    F: Fn(I) -> Result<O, SweepError> + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: I) -> Result<O, SweepError> {
        (self.func)(input)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn panic_error(task: &str, payload: &(dyn Any + Send)) -> SweepError {
    SweepError::ComputeFailure(
        ErrorInfo::new("task_panicked", panic_message(payload)).with_context("task", task),
    )
}

/// Runs one input, turning a panic into a [`SweepError::ComputeFailure`].
pub(crate) fn run_caught<T: Task + ?Sized>(task: &T, input: T::Input) -> Result<T::Output, SweepError> {
    catch_unwind(AssertUnwindSafe(|| task.run(input)))
        .unwrap_or_else(|payload| Err(panic_error(task.name(), payload.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_become_tasks() {
        let task = FnTask::new("double", |x: i64| Ok::<_, SweepError>(x * 2));
        assert_eq!(task.name(), "double");
        assert_eq!(task.run(21), Ok(42));
    }

    #[test]
    fn panics_are_caught_per_input() {
        let task = FnTask::new("boom", |x: i64| -> Result<i64, SweepError> {
            if x == 2 {
                panic!("two is not allowed");
            }
            Ok(x)
        });
        assert_eq!(run_caught(&task, 1), Ok(1));
        let err = run_caught(&task, 2).expect_err("panic");
        assert_eq!(err.info().code, "task_panicked");
        assert_eq!(err.info().message, "two is not allowed");
    }
}
