#![deny(missing_docs)]
#![doc = "Sweep orchestration: dedupe, dispatch only what the store lacks, read everything back, then plot."]

pub mod experiment;
/// Compute-and-store task wrapper.
pub mod persist;
pub mod sweep;

pub use experiment::{
    register_experiment_tasks, run_experiment, ConfigSource, ExperimentOpts, ExperimentOutcome,
    PlotJob, SweepReport, EXPERIMENTS_PHASE, PLOTTING_PHASE, REPORT_FILE,
};
pub use persist::{PersistJob, Persisting};
pub use sweep::{run_sweep, ResultSet, SweepFailure, SweepOpts, SweepStats};
