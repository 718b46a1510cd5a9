use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn gsw_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gsw-sim"))
        .args(args)
        .env("GSW_LOG", "warn")
        .env_remove("GSW_POOL_DEPTH")
        .output()
        .expect("run gsw-sim")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn svg_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .expect("plot dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("svg"))
        .count()
}

#[test]
fn grid_prints_six_configurations() {
    let output = gsw_sim(&["grid"]);
    assert!(output.status.success());
    let text = stdout(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    for line in &lines {
        let (key, args) = line.split_once('\t').expect("tab separated");
        assert!(key.contains("num_rows=10"));
        assert!(args.contains("--num_iters 200"));
    }
}

#[test]
fn extended_grid_adds_the_long_runs() {
    let output = gsw_sim(&["grid", "--do-long"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().count(), 8);
}

#[test]
fn worker_subcommand_is_hidden() {
    let output = gsw_sim(&["--help"]);
    let text = stdout(&output);
    assert!(text.contains("sweep"));
    assert!(!text.contains("worker"));
}

#[cfg(target_os = "linux")]
#[test]
fn process_sweep_is_cached_on_rerun() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("results");
    let root_arg = root.to_str().expect("utf-8 path");
    let sweep = [
        "sweep",
        "--dirname",
        root_arg,
        "--num-iters",
        "30",
        "--workers",
        "3",
        "--mapper",
        "process",
    ];

    let first = gsw_sim(&sweep);
    assert_eq!(first.status.code(), Some(0), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(stdout(&first).contains("6 configurations: 6 computed, 0 cached, 0 failed"));
    assert_eq!(svg_count(&root.join("plots")), 6);
    assert!(root.join(".sweep_report.json").is_file());

    let second = gsw_sim(&sweep);
    assert_eq!(second.status.code(), Some(0));
    assert!(stdout(&second).contains("6 configurations: 0 computed, 6 cached, 0 failed"));

    let listed = gsw_sim(&["list", "--dirname", root_arg]);
    assert_eq!(stdout(&listed).lines().count(), 6);
}

#[test]
fn serial_sweep_without_plots() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("results");
    let output = gsw_sim(&[
        "sweep",
        "--dirname",
        root.to_str().expect("utf-8 path"),
        "--num-iters",
        "20",
        "--mapper",
        "serial",
        "--no-plots",
        "--histogram-norm",
        "counts",
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("6 computed"));
    assert!(!root.join("plots").exists());
}

#[test]
fn forced_thread_sweep_recomputes() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("results");
    let root_arg = root.to_str().expect("utf-8 path");
    let base = ["sweep", "--dirname", root_arg, "--num-iters", "20", "--mapper", "thread", "--no-plots"];
    assert!(gsw_sim(&base).status.success());

    let mut forced = base.to_vec();
    forced.push("--force");
    let output = gsw_sim(&forced);
    assert!(output.status.success());
    assert!(stdout(&output).contains("6 computed, 0 cached"));
}

#[test]
fn unknown_flag_is_rejected() {
    let output = gsw_sim(&["sweep", "--num-cols", "3"]);
    assert!(!output.status.success());
}
