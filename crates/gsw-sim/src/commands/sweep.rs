use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::{Args, ValueEnum};
use gsw_config::{geweke_schema, GridSpec, CONTINUOUS, MULTINOMIAL};
use gsw_core::errors::SweepError;
use gsw_pool::{AnyMapper, ProcessPool, SerialMapper, ThreadMapper, WorkerCommand};
use gsw_run::{run_experiment, ConfigSource, ExperimentOpts, REPORT_FILE};

use super::{TaskArgs, EXIT_PARTIAL};
use crate::logging::LogConfig;

/// Which mapper runs the configurations and the plots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum MapperKind {
    /// One worker process per slot, nested pools allowed.
    #[default]
    Process,
    /// A rayon pool inside this process.
    Thread,
    /// In order, in this process.
    Serial,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Result directory; also the store root.
    #[arg(long, default_value = "geweke_on_schemas")]
    pub dirname: PathBuf,
    /// Row count of the regular grid entries.
    #[arg(long, default_value_t = 10)]
    pub base_num_rows: i64,
    /// Forward and successive-conditional draws per column.
    #[arg(long, default_value_t = 200)]
    pub num_iters: i64,
    /// Skip the plotting phase.
    #[arg(long)]
    pub no_plots: bool,
    /// Add the large hand-picked configurations.
    #[arg(long)]
    pub do_long: bool,
    /// Worker count; defaults to the available parallelism.
    #[arg(long)]
    pub workers: Option<usize>,
    /// Mapper for both phases.
    #[arg(long, value_enum, default_value_t = MapperKind::Process)]
    pub mapper: MapperKind,
    /// Recompute configurations that are already stored.
    #[arg(long)]
    pub force: bool,
    /// Plot directory; defaults to `<dirname>/plots`.
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,
    #[command(flatten)]
    pub tasks: TaskArgs,
}

impl SweepArgs {
    fn grid(&self) -> GridSpec {
        GridSpec::new(
            self.base_num_rows,
            self.num_iters,
            vec![CONTINUOUS.to_string(), MULTINOMIAL.to_string()],
        )
        .with_extended(self.do_long)
    }

    fn workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        })
    }

    fn mapper(&self, log: &LogConfig) -> Result<AnyMapper, SweepError> {
        let workers = self.workers();
        Ok(match self.mapper {
            MapperKind::Process => {
                let command = WorkerCommand::current_exe(self.tasks.worker_args(log))?;
                ProcessPool::new(workers, command).into()
            }
            MapperKind::Thread => ThreadMapper::new(workers).into(),
            MapperKind::Serial => SerialMapper.into(),
        })
    }
}

pub fn run(args: &SweepArgs, log: &LogConfig) -> Result<ExitCode, SweepError> {
    let source = ConfigSource::Grid {
        schema: geweke_schema(),
        spec: args.grid(),
    };
    let opts = ExperimentOpts {
        plots: !args.no_plots,
        force: args.force,
        plot_dir: args.plot_dir.clone(),
        ..ExperimentOpts::new(&args.dirname)
    };
    let mapper = args.mapper(log)?;
    let outcome = run_experiment(
        &source,
        &args.tasks.compute(log),
        &args.tasks.render(),
        &mapper,
        &opts,
    )?;

    let report = &outcome.report;
    println!(
        "{} configurations: {} computed, {} cached, {} failed",
        report.stats.unique, report.stats.computed, report.stats.cached, report.stats.failed
    );
    if opts.plots {
        println!(
            "{} plots in {} ({} failed)",
            report.plots.len(),
            opts.plot_dir().display(),
            report.plot_failures.len()
        );
    }
    for failure in report.failures.iter().chain(&report.plot_failures) {
        println!("failed {}: {}", failure.key, failure.error);
    }
    println!("report: {}", opts.root.join(REPORT_FILE).display());

    if report.failures.is_empty() && report.plot_failures.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}
