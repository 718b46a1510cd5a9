//! Public experiment entry point: sweep, then optionally plot everything stored.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use gsw_config::{generate_configs, Configuration, GridSpec, Schema, StorageKey};
use gsw_core::errors::SweepError;
use gsw_core::hash::stable_hash_string;
use gsw_core::provenance::RunProvenance;
use gsw_core::serde::to_canonical_json_bytes;
use gsw_core::timer::{timed, PhaseLog, PhaseTiming};
use gsw_pool::{Mapper, Task, TaskRegistry};
use gsw_store::ResultStore;
use serde::{Deserialize, Serialize};

use crate::persist::Persisting;
use crate::sweep::{run_sweep, ResultSet, SweepFailure, SweepOpts, SweepStats};

/// File name of the sweep report inside the store root.
///
/// The leading dot keeps it out of the store's key listing.
pub const REPORT_FILE: &str = ".sweep_report.json";
/// Phase label of the dispatch phase.
pub const EXPERIMENTS_PHASE: &str = "experiments";
/// Phase label of the render phase.
pub const PLOTTING_PHASE: &str = "plotting";

/// Where the configurations of an experiment come from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A fixed list.
    Explicit(Vec<Configuration>),
    /// A grid expanded and decoded through a schema.
    Grid {
        /// Schema the grid entries are decoded with.
        schema: Schema,
        /// Grid parameters, including the extended flag.
        spec: GridSpec,
    },
}

impl ConfigSource {
    /// The configurations to sweep.
    pub fn configs(&self) -> Result<Vec<Configuration>, SweepError> {
        match self {
            ConfigSource::Explicit(configs) => Ok(configs.clone()),
            ConfigSource::Grid { schema, spec } => generate_configs(schema, spec),
        }
    }
}

/// Options for [`run_experiment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentOpts {
    /// Result store root.
    pub root: PathBuf,
    /// Run the plotting phase after the sweep.
    pub plots: bool,
    /// Recompute stored configurations.
    pub force: bool,
    /// Output directory for plots; `<root>/plots` when unset.
    pub plot_dir: Option<PathBuf>,
}

impl ExperimentOpts {
    /// Options with plotting on and no forced recompute.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plots: true,
            force: false,
            plot_dir: None,
        }
    }

    /// Effective plot directory.
    pub fn plot_dir(&self) -> PathBuf {
        self.plot_dir
            .clone()
            .unwrap_or_else(|| self.root.join("plots"))
    }
}

/// Input of the render collaborator: one stored result to draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotJob {
    /// Result store root to read the result from.
    pub root: PathBuf,
    /// Key of the stored result.
    pub key: StorageKey,
    /// Configuration of the result.
    pub config: Configuration,
    /// Directory the artefact goes into.
    pub out_dir: PathBuf,
}

/// Persisted summary of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// When and by what the report was written.
    pub provenance: RunProvenance,
    /// SHA-256 of the sorted storage keys the sweep covered.
    pub fingerprint: String,
    /// Mapper used for both phases.
    pub mapper: String,
    /// Sweep counters.
    pub stats: SweepStats,
    /// Configurations without a result.
    pub failures: Vec<SweepFailure>,
    /// Artefacts written by the plotting phase.
    #[serde(default)]
    pub plots: Vec<PathBuf>,
    /// Results the renderer failed on.
    #[serde(default)]
    pub plot_failures: Vec<SweepFailure>,
    /// Phase timings in recording order.
    pub phases: Vec<PhaseTiming>,
}

/// Everything an experiment produced.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome<R> {
    /// The sweep's results.
    pub results: ResultSet<R>,
    /// The persisted report.
    pub report: SweepReport,
}

/// Registers the tasks a worker process needs to serve `run_experiment`.
pub fn register_experiment_tasks<C, P>(registry: &mut TaskRegistry, compute: C, render: P)
where
    C: Task<Input = Configuration> + 'static,
    P: Task<Input = PlotJob, Output = PathBuf> + 'static,
{
    registry.register(Persisting::new(compute));
    registry.register(render);
}

/// Sweeps `source` and, when `opts.plots` is set, renders every result in
/// the store (not only this sweep's) with `render`.
///
/// Both phases are timed; the report is written to [`REPORT_FILE`] in the
/// root even when the plotting phase fails.
pub fn run_experiment<C, P, M>(
    source: &ConfigSource,
    compute: &C,
    render: &P,
    mapper: &M,
    opts: &ExperimentOpts,
) -> Result<ExperimentOutcome<C::Output>, SweepError>
where
    C: Task<Input = Configuration>,
    P: Task<Input = PlotJob, Output = PathBuf>,
    M: Mapper,
{
    let configs = source.configs()?;
    let keys: BTreeSet<StorageKey> = configs.iter().map(Configuration::storage_key).collect();
    let fingerprint = stable_hash_string(&keys)?;
    let store = ResultStore::open(&opts.root)?;
    let log = PhaseLog::new();
    let results = timed(EXPERIMENTS_PHASE, &log, || {
        run_sweep(
            &configs,
            compute,
            &store,
            mapper,
            &SweepOpts { force: opts.force },
        )
    })?;

    let mut report = SweepReport {
        provenance: RunProvenance::now("gsw-run", env!("CARGO_PKG_VERSION")),
        fingerprint,
        mapper: mapper.describe(),
        stats: results.stats,
        failures: results.failures.clone(),
        plots: Vec::new(),
        plot_failures: Vec::new(),
        phases: Vec::new(),
    };

    let plotted = if opts.plots {
        timed(PLOTTING_PHASE, &log, || {
            plot_all(&store, render, mapper, &opts.plot_dir())
        })
    } else {
        Ok((Vec::new(), Vec::new()))
    };
    if let Ok((plots, plot_failures)) = &plotted {
        report.plots = plots.clone();
        report.plot_failures = plot_failures.clone();
    }
    report.phases = log.snapshot();
    write_report(store.root(), &report)?;
    plotted?;

    Ok(ExperimentOutcome { results, report })
}

fn plot_all<P, M>(
    store: &ResultStore,
    render: &P,
    mapper: &M,
    out_dir: &Path,
) -> Result<(Vec<PathBuf>, Vec<SweepFailure>), SweepError>
where
    P: Task<Input = PlotJob, Output = PathBuf>,
    M: Mapper,
{
    fs::create_dir_all(out_dir).map_err(|err| {
        SweepError::store_io("plot_dir", err).with_context("path", out_dir.display().to_string())
    })?;
    let mut jobs = Vec::new();
    let mut failures = Vec::new();
    for key in store.list_keys()? {
        match store.read_config(&key) {
            Ok(config) => jobs.push(PlotJob {
                root: store.root().to_path_buf(),
                key,
                config,
                out_dir: out_dir.to_path_buf(),
            }),
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "skipping unreadable result");
                failures.push(SweepFailure {
                    key,
                    config: Configuration::default(),
                    error,
                });
            }
        }
    }
    tracing::info!(results = jobs.len(), out_dir = %out_dir.display(), "rendering stored results");

    let slots = mapper.map(render, jobs.clone())?;
    let mut plots = Vec::new();
    for (job, slot) in jobs.into_iter().zip(slots) {
        match slot {
            Ok(path) => plots.push(path),
            Err(error) => {
                tracing::warn!(key = %job.key, error = %error, "render failed");
                failures.push(SweepFailure {
                    key: job.key,
                    config: job.config,
                    error,
                });
            }
        }
    }
    Ok((plots, failures))
}

fn write_report(root: &Path, report: &SweepReport) -> Result<(), SweepError> {
    let path = root.join(REPORT_FILE);
    let bytes = to_canonical_json_bytes(report)?;
    fs::write(&path, bytes).map_err(|err| {
        SweepError::store_io("report_write", err).with_context("path", path.display().to_string())
    })
}
