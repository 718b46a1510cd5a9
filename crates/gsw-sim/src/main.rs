use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{
    grid::{self, GridArgs},
    list::{self, ListArgs},
    sweep::{self, SweepArgs},
    worker::{self, WorkerArgs},
};
use logging::{LogConfig, LogFormat, LogLevel};

mod commands;
mod geweke;
mod logging;
mod render;

#[derive(Parser, Debug)]
#[command(
    name = "gsw-sim",
    about = "Geweke checks swept over column-type schemas, cached per configuration"
)]
struct Cli {
    /// Log level when neither GSW_LOG nor RUST_LOG is set.
    #[arg(long, global = true, default_value_t = LogLevel::default())]
    log_level: LogLevel,
    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every configuration of the grid not yet stored, then plot.
    Sweep(SweepArgs),
    /// Print the grid: one storage key and argument list per line.
    Grid(GridArgs),
    /// Print the storage keys present under a result directory.
    List(ListArgs),
    /// Serve pool tasks on stdin/stdout.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(LogConfig::new(cli.log_level, cli.log_format).with_env_overrides());
    let log = LogConfig::new(cli.log_level, cli.log_format);
    let outcome = match cli.command {
        Command::Sweep(args) => sweep::run(&args, &log),
        Command::Grid(args) => grid::run(&args),
        Command::List(args) => list::run(&args),
        Command::Worker(args) => worker::run(&args, &log),
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(family = err.family(), error = %err, "gsw-sim failed");
            eprintln!("error: {err}");
            if err.is_batch_fatal() {
                ExitCode::from(commands::EXIT_POOL_FAILURE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
