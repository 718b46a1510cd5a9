use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use gsw_config::{generate_configs, geweke_schema, Configuration, GridSpec};
use gsw_core::errors::SweepError;
use gsw_core::timer::PhaseOutcome;
use gsw_pool::{FnTask, SerialMapper, Task, ThreadMapper};
use gsw_run::{
    run_experiment, run_sweep, ConfigSource, ExperimentOpts, PlotJob, SweepOpts, SweepReport,
    EXPERIMENTS_PHASE, PLOTTING_PHASE, REPORT_FILE,
};
use gsw_store::ResultStore;
use tempfile::tempdir;

fn scenario() -> GridSpec {
    GridSpec::new(10, 200, vec!["continuous".into(), "multinomial".into()])
}

fn scenario_configs() -> Vec<Configuration> {
    generate_configs(&geweke_schema(), &scenario()).expect("grid")
}

fn counting(calls: &AtomicUsize) -> impl Task<Input = Configuration, Output = i64> + '_ {
    FnTask::new("count_cols", move |config: Configuration| {
        calls.fetch_add(1, Ordering::SeqCst);
        config.int("num_cols")
    })
}

fn render() -> impl Task<Input = PlotJob, Output = PathBuf> {
    FnTask::new("touch", |job: PlotJob| {
        let path = job.out_dir.join(format!("{}.txt", job.key));
        fs::write(&path, job.key.as_str()).map_err(|err| SweepError::store_io("touch", err))?;
        Ok(path)
    })
}

#[test]
fn second_sweep_computes_nothing() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let calls = AtomicUsize::new(0);
    let compute = counting(&calls);
    let configs = scenario_configs();

    let first = run_sweep(&configs, &compute, &store, &ThreadMapper::new(3), &SweepOpts::default())
        .expect("first sweep");
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(first.len(), 6);
    assert_eq!(first.stats.computed, 6);
    assert_eq!(first.stats.cached, 0);

    let second = run_sweep(&configs, &compute, &store, &ThreadMapper::new(3), &SweepOpts::default())
        .expect("second sweep");
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(second.len(), 6);
    assert_eq!(second.stats.cached, 6);
    assert_eq!(second.stats.computed, 0);
    assert_eq!(first.entries, second.entries);
}

#[test]
fn overlapping_sweeps_compute_only_new_keys() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let calls = AtomicUsize::new(0);
    let compute = counting(&calls);
    let configs = scenario_configs();

    run_sweep(&configs[..4], &compute, &store, &SerialMapper, &SweepOpts::default()).expect("first");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let all = run_sweep(&configs, &compute, &store, &SerialMapper, &SweepOpts::default()).expect("all");
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(all.stats.cached, 4);
    assert_eq!(all.len(), 6);
}

#[test]
fn duplicates_are_computed_once() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let calls = AtomicUsize::new(0);
    let mut configs = scenario_configs();
    configs.extend(scenario_configs());

    let results = run_sweep(&configs, &counting(&calls), &store, &SerialMapper, &SweepOpts::default())
        .expect("sweep");
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(results.stats.requested, 12);
    assert_eq!(results.stats.unique, 6);
}

#[test]
fn force_recomputes_everything() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let calls = AtomicUsize::new(0);
    let compute = counting(&calls);
    let configs = scenario_configs();

    run_sweep(&configs, &compute, &store, &SerialMapper, &SweepOpts::default()).expect("first");
    run_sweep(&configs, &compute, &store, &SerialMapper, &SweepOpts { force: true }).expect("forced");
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[test]
fn failures_are_reported_and_successes_persist() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let configs = scenario_configs();
    let picky = FnTask::new("picky", |config: Configuration| {
        let cols = config.int("num_cols")?;
        if cols == 10 {
            return Err(SweepError::compute("too_wide", "ten columns rejected"));
        }
        Ok(cols)
    });

    let results = run_sweep(&configs, &picky, &store, &ThreadMapper::new(2), &SweepOpts::default())
        .expect("sweep");
    assert_eq!(results.len(), 4);
    assert_eq!(results.failures.len(), 2);
    assert_eq!(results.stats.failed, 2);
    assert!(!results.is_complete());
    for failure in &results.failures {
        assert_eq!(failure.error.info().code, "too_wide");
        assert!(!store.exists(&failure.key));
    }
    assert_eq!(store.list_keys().expect("keys").len(), 4);
}

#[test]
fn corrupt_cached_result_is_a_failure_not_an_abort() {
    let dir = tempdir().expect("tempdir");
    let store = ResultStore::open(dir.path()).expect("store");
    let calls = AtomicUsize::new(0);
    let configs = scenario_configs();
    run_sweep(&configs, &counting(&calls), &store, &SerialMapper, &SweepOpts::default()).expect("first");

    fs::write(store.path_for(&configs[0].storage_key()), b"{ truncated").expect("corrupt");
    let results = run_sweep(&configs, &counting(&calls), &store, &SerialMapper, &SweepOpts::default())
        .expect("second");
    assert_eq!(results.len(), 5);
    assert_eq!(results.failures.len(), 1);
    assert_eq!(results.failures[0].key, configs[0].storage_key());
}

#[test]
fn experiment_times_phases_and_plots_everything_stored() {
    let dir = tempdir().expect("tempdir");
    let calls = AtomicUsize::new(0);
    let compute = counting(&calls);
    let source = ConfigSource::Grid {
        schema: geweke_schema(),
        spec: scenario(),
    };
    let opts = ExperimentOpts::new(dir.path().join("results"));

    let outcome = run_experiment(&source, &compute, &render(), &SerialMapper, &opts).expect("experiment");
    assert_eq!(outcome.results.len(), 6);
    assert_eq!(outcome.report.plots.len(), 6);
    for plot in &outcome.report.plots {
        assert!(plot.starts_with(opts.plot_dir()));
        assert!(plot.is_file());
    }
    let labels: Vec<&str> = outcome.report.phases.iter().map(|phase| phase.label.as_str()).collect();
    assert_eq!(labels, vec![EXPERIMENTS_PHASE, PLOTTING_PHASE]);
    assert!(outcome
        .report
        .phases
        .iter()
        .all(|phase| phase.outcome == PhaseOutcome::Completed));

    let bytes = fs::read(opts.root.join(REPORT_FILE)).expect("report");
    let report: SweepReport = serde_json::from_slice(&bytes).expect("decode report");
    assert_eq!(report.stats.computed, 6);
    assert_eq!(report.fingerprint.len(), 64);

    // Rerunning the same grid covers the same keys.
    let again = run_experiment(&source, &compute, &render(), &SerialMapper, &opts).expect("rerun");
    assert_eq!(again.report.fingerprint, report.fingerprint);
    assert_eq!(again.report.stats.cached, 6);

    // The report file does not show up as a stored result.
    let store = ResultStore::open(&opts.root).expect("store");
    assert_eq!(store.list_keys().expect("keys").len(), 6);
}

#[test]
fn experiment_without_plots_skips_render() {
    let dir = tempdir().expect("tempdir");
    let calls = AtomicUsize::new(0);
    let opts = ExperimentOpts {
        plots: false,
        ..ExperimentOpts::new(dir.path())
    };
    let never = FnTask::new("never", |_: PlotJob| -> Result<PathBuf, SweepError> {
        panic!("render must not run")
    });
    let outcome = run_experiment(
        &ConfigSource::Explicit(scenario_configs()),
        &counting(&calls),
        &never,
        &SerialMapper,
        &opts,
    )
    .expect("experiment");
    assert_eq!(outcome.report.phases.len(), 1);
    assert!(outcome.report.plots.is_empty());
    assert!(!opts.plot_dir().exists());
}

#[test]
fn unreadable_result_fails_only_its_own_plot() {
    let dir = tempdir().expect("tempdir");
    let calls = AtomicUsize::new(0);
    let compute = counting(&calls);
    let source = ConfigSource::Explicit(scenario_configs());
    let opts = ExperimentOpts::new(dir.path().join("results"));
    run_experiment(&source, &compute, &render(), &SerialMapper, &opts).expect("first");

    let broken = scenario_configs()[0].storage_key();
    let store = ResultStore::open(&opts.root).expect("store");
    fs::write(store.path_for(&broken), b"{ 1: 2 }").expect("corrupt");

    let outcome =
        run_experiment(&source, &compute, &render(), &SerialMapper, &opts).expect("rerun");
    assert_eq!(outcome.results.len(), 5);
    assert_eq!(outcome.report.plots.len(), 5);
    assert_eq!(outcome.report.plot_failures.len(), 1);
    assert_eq!(outcome.report.plot_failures[0].key, broken);
    assert!(outcome.report.plot_failures[0].config.is_empty());
}
