use std::process::ExitCode;

use clap::Args;
use gsw_core::errors::SweepError;
use gsw_pool::run_worker_main;

use super::TaskArgs;
use crate::logging::LogConfig;

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub tasks: TaskArgs,
}

/// Never returns: the worker exits once its parent says so or hangs up.
pub fn run(args: &WorkerArgs, log: &LogConfig) -> Result<ExitCode, SweepError> {
    tracing::debug!(pid = std::process::id(), "pool worker starting");
    run_worker_main(&args.tasks.registry(log))
}
