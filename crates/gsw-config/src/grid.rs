//! Deterministic expansion of the Geweke configuration grid.

use std::collections::BTreeSet;

use gsw_core::errors::SweepError;
use serde::{Deserialize, Serialize};

use crate::geweke::{CONTINUOUS, MULTINOMIAL};
use crate::schema::Schema;
use crate::value::{ArgList, Configuration};

const NUM_COLS_LONG: i64 = 100;
const NUM_ROWS_LONG: i64 = 100;

/// Hand-picked large runs added when the extended grid is requested:
/// column type and an optional fixed multinomial cardinality.
const LONG_RUNS: [(&str, Option<i64>); 2] = [(CONTINUOUS, None), (MULTINOMIAL, Some(2))];

/// Parameters of a sweep grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Row count shared by every non-extended configuration.
    pub base_num_rows: i64,
    /// Iterations per configuration.
    pub num_iters: i64,
    /// Candidate column types.
    pub cctypes: Vec<String>,
    /// Column counts used for each type (and for each type of a pair).
    #[serde(default = "GridSpec::default_num_cols")]
    pub num_cols_list: Vec<i64>,
    /// Adds the large hand-picked configurations.
    #[serde(default)]
    pub extended: bool,
}

impl GridSpec {
    fn default_num_cols() -> Vec<i64> {
        vec![1, 10]
    }

    /// Grid over `cctypes` at the default column scales.
    pub fn new(base_num_rows: i64, num_iters: i64, cctypes: Vec<String>) -> Self {
        Self {
            base_num_rows,
            num_iters,
            cctypes,
            num_cols_list: Self::default_num_cols(),
            extended: false,
        }
    }

    /// Toggles the extended grid.
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::new(10, 200, vec![CONTINUOUS.to_string(), MULTINOMIAL.to_string()])
    }
}

fn run_args(num_rows: i64, num_iters: i64, cctypes: &[String]) -> ArgList {
    ArgList::new()
        .with_scalar("num_rows", num_rows)
        .with_scalar("num_cols", cctypes.len())
        .with_scalar("num_iters", num_iters)
        .with_list("cctypes", cctypes)
}

fn repeat_types(runs: &[(&str, i64)]) -> Vec<String> {
    runs.iter()
        .flat_map(|(name, count)| std::iter::repeat(name.to_string()).take(*count as usize))
        .collect()
}

fn unique<T: Ord + Clone>(values: &[T]) -> Vec<T> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .filter(|value| seen.insert((*value).clone()))
        .cloned()
        .collect()
}

/// Expands the grid into argument lists.
///
/// Order: every single type at every column scale (type-major), then every
/// unordered pair of distinct types (sorted) at every scale, then the long
/// runs when `extended` is set.
pub fn generate_arg_lists(spec: &GridSpec) -> Vec<ArgList> {
    let types = unique(&spec.cctypes);
    let scales: Vec<i64> = unique(&spec.num_cols_list)
        .into_iter()
        .filter(|num_cols| *num_cols > 0)
        .collect();
    let mut args = Vec::new();

    for cctype in &types {
        for &num_cols in &scales {
            let cctypes = repeat_types(&[(cctype.as_str(), num_cols)]);
            args.push(run_args(spec.base_num_rows, spec.num_iters, &cctypes));
        }
    }

    let mut pairs = Vec::new();
    for (idx, first) in types.iter().enumerate() {
        for second in &types[idx + 1..] {
            pairs.push((first.clone(), second.clone()));
        }
    }
    pairs.sort();
    for (first, second) in &pairs {
        for &num_cols in &scales {
            let cctypes = repeat_types(&[(first.as_str(), num_cols), (second.as_str(), num_cols)]);
            args.push(run_args(spec.base_num_rows, spec.num_iters, &cctypes));
        }
    }

    if spec.extended {
        for (cctype, num_values) in LONG_RUNS {
            let cctypes = repeat_types(&[(cctype, NUM_COLS_LONG)]);
            let mut run = run_args(NUM_ROWS_LONG, spec.num_iters, &cctypes);
            if let Some(num_values) = num_values {
                run = run.with_scalar("num_multinomial_values", num_values);
            }
            args.push(run);
        }
    }
    args
}

/// Expands the grid and decodes every entry through `schema`.
///
/// Entries that decode to an already produced configuration are dropped, so
/// the result never holds duplicates.
pub fn generate_configs(schema: &Schema, spec: &GridSpec) -> Result<Vec<Configuration>, SweepError> {
    let mut seen = BTreeSet::new();
    let mut configs = Vec::new();
    for args in generate_arg_lists(spec) {
        let config = schema
            .parse(&args)
            .map_err(|err| err.with_context("args", args.to_string()))?;
        if seen.insert(config.storage_key()) {
            configs.push(config);
        }
    }
    Ok(configs)
}
