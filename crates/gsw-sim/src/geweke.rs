//! Geweke joint-distribution check on synthetic single-column models.
//!
//! Each column gets its own conjugate model. The forward chain draws
//! parameters and data from the prior; the successive-conditional chain
//! alternates posterior and likelihood draws. Both should produce the same
//! distribution of the test statistic, so a large two-sample
//! Kolmogorov-Smirnov distance points at a broken posterior update.

use gsw_config::{ColumnType, Configuration, GewekeParams};
use gsw_core::errors::{ErrorInfo, SweepError};
use gsw_pool::{
    is_pool_worker, AnyMapper, Mapper, ProcessPool, SerialMapper, Task, ThreadMapper,
    WorkerCommand,
};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Dirichlet, Normal};
use serde::{Deserialize, Serialize};

/// Name of the per-configuration compute task.
pub const GEWEKE_TASK: &str = "geweke";
/// Name of the per-column chain task.
pub const CHAIN_TASK: &str = "geweke-chain";

const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// One column's chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainJob {
    /// Column index.
    pub column: usize,
    /// Column model.
    pub cctype: ColumnType,
    /// Rows drawn per iteration.
    pub num_rows: usize,
    /// Draws per chain.
    pub num_iters: usize,
    /// Categories of a multinomial column.
    pub num_multinomial_values: usize,
    /// Seed of this column's generator.
    pub seed: u64,
}

/// Test statistic samples of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnChains {
    /// Column index.
    pub column: usize,
    /// Column model.
    pub cctype: ColumnType,
    /// Statistic under forward sampling.
    pub forward: Vec<f64>,
    /// Statistic under successive-conditional sampling.
    pub posterior: Vec<f64>,
    /// Two-sample KS distance between the two.
    pub ks_distance: f64,
}

/// Result stored for one Geweke configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GewekeResult {
    /// Parameters the run used.
    pub params: GewekeParams,
    /// Per-column chains in column order.
    pub columns: Vec<ColumnChains>,
    /// Largest KS distance over all columns.
    pub max_ks_distance: f64,
}

/// Column seeds differ per column but are fixed by `gen_seed`.
pub fn column_seed(gen_seed: u64, column: usize) -> u64 {
    gen_seed ^ (column as u64 + 1).wrapping_mul(SEED_STRIDE)
}

/// Splits a configuration into one chain job per column.
pub fn chain_jobs(params: &GewekeParams) -> Vec<ChainJob> {
    params
        .cctypes
        .iter()
        .enumerate()
        .map(|(column, cctype)| ChainJob {
            column,
            cctype: *cctype,
            num_rows: params.num_rows,
            num_iters: params.num_iters,
            num_multinomial_values: params.num_multinomial_values,
            seed: column_seed(params.gen_seed, column),
        })
        .collect()
}

/// The compute collaborator: chains per column through a nested mapper.
#[derive(Debug, Clone)]
pub struct GewekeTask {
    chain_workers: usize,
    worker_args: Vec<String>,
}

impl GewekeTask {
    /// Runs at most `chain_workers` column chains at a time.
    pub fn new(chain_workers: usize) -> Self {
        Self {
            chain_workers: chain_workers.max(1),
            worker_args: vec!["worker".to_string()],
        }
    }

    /// Arguments of the nested worker command, when running inside a pool.
    pub fn with_worker_args(mut self, args: Vec<String>) -> Self {
        self.worker_args = args;
        self
    }

    /// Mapper for the column chains.
    ///
    /// Inside a pool worker this is a nested process pool; the root pool
    /// owns the process group and reaps whatever it leaves behind.
    pub fn chain_mapper(&self) -> Result<AnyMapper, SweepError> {
        if is_pool_worker() {
            let command = WorkerCommand::current_exe(self.worker_args.iter().cloned())?;
            return Ok(ProcessPool::new(self.chain_workers, command).into());
        }
        if self.chain_workers > 1 {
            Ok(ThreadMapper::new(self.chain_workers).into())
        } else {
            Ok(SerialMapper.into())
        }
    }
}

impl Task for GewekeTask {
    type Input = Configuration;
    type Output = GewekeResult;

    fn name(&self) -> &str {
        GEWEKE_TASK
    }

    fn run(&self, config: Configuration) -> Result<GewekeResult, SweepError> {
        let params = GewekeParams::from_config(&config)?;
        let jobs = chain_jobs(&params);
        let mapper = self.chain_mapper()?;
        tracing::debug!(
            columns = jobs.len(),
            mapper = %mapper.describe(),
            "running geweke chains"
        );
        let columns = mapper
            .map(&ChainTask, jobs)?
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        let max_ks_distance = columns
            .iter()
            .map(|column| column.ks_distance)
            .fold(0.0, f64::max);
        Ok(GewekeResult {
            params,
            columns,
            max_ks_distance,
        })
    }
}

/// Runs both chains of one column.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainTask;

impl Task for ChainTask {
    type Input = ChainJob;
    type Output = ColumnChains;

    fn name(&self) -> &str {
        CHAIN_TASK
    }

    fn run(&self, job: ChainJob) -> Result<ColumnChains, SweepError> {
        run_chains(&job)
    }
}

/// Forward and successive-conditional samples of one column.
pub fn run_chains(job: &ChainJob) -> Result<ColumnChains, SweepError> {
    if job.num_rows == 0 || job.num_iters == 0 {
        return Err(SweepError::ComputeFailure(
            ErrorInfo::new("empty_chain", "chains need at least one row and one iteration")
                .with_context("column", job.column.to_string()),
        ));
    }
    let mut rng = StdRng::seed_from_u64(job.seed);
    let (forward, posterior) = match job.cctype {
        ColumnType::Continuous => {
            let model = NormalMean::new()?;
            (
                model.forward(&mut rng, job.num_rows, job.num_iters)?,
                model.successive(&mut rng, job.num_rows, job.num_iters)?,
            )
        }
        ColumnType::Multinomial => {
            let model = DirichletCategorical::new(job.num_multinomial_values)?;
            (
                model.forward(&mut rng, job.num_rows, job.num_iters)?,
                model.successive(&mut rng, job.num_rows, job.num_iters)?,
            )
        }
    };
    let ks_distance = ks_distance(&forward, &posterior);
    Ok(ColumnChains {
        column: job.column,
        cctype: job.cctype,
        forward,
        posterior,
        ks_distance,
    })
}

fn distribution_error(code: &str, err: impl std::fmt::Debug) -> SweepError {
    SweepError::compute(code, format!("{err:?}"))
}

/// `mu ~ N(0, 1)`, `x_i | mu ~ N(mu, 1)`; the statistic is the data mean.
struct NormalMean {
    prior: Normal<f64>,
}

impl NormalMean {
    fn new() -> Result<Self, SweepError> {
        let prior = Normal::new(0.0, 1.0).map_err(|err| distribution_error("normal_prior", err))?;
        Ok(Self { prior })
    }

    fn data(&self, rng: &mut StdRng, mu: f64, rows: usize) -> Result<Vec<f64>, SweepError> {
        let likelihood =
            Normal::new(mu, 1.0).map_err(|err| distribution_error("normal_likelihood", err))?;
        Ok((0..rows).map(|_| likelihood.sample(rng)).collect())
    }

    fn posterior(&self, rng: &mut StdRng, data: &[f64]) -> Result<f64, SweepError> {
        let precision = 1.0 + data.len() as f64;
        let mean = data.iter().sum::<f64>() / precision;
        Normal::new(mean, precision.recip().sqrt())
            .map(|posterior| posterior.sample(rng))
            .map_err(|err| distribution_error("normal_posterior", err))
    }

    fn forward(&self, rng: &mut StdRng, rows: usize, iters: usize) -> Result<Vec<f64>, SweepError> {
        (0..iters)
            .map(|_| {
                let mu = self.prior.sample(rng);
                self.data(rng, mu, rows).map(|data| mean(&data))
            })
            .collect()
    }

    fn successive(&self, rng: &mut StdRng, rows: usize, iters: usize) -> Result<Vec<f64>, SweepError> {
        let mut mu = self.prior.sample(rng);
        let mut data = self.data(rng, mu, rows)?;
        let mut samples = Vec::with_capacity(iters);
        for _ in 0..iters {
            mu = self.posterior(rng, &data)?;
            data = self.data(rng, mu, rows)?;
            samples.push(mean(&data));
        }
        Ok(samples)
    }
}

/// `theta ~ Dirichlet(1)`, `x_i | theta ~ Categorical(theta)`; the statistic
/// is the share of rows in category zero.
struct DirichletCategorical {
    prior: Dirichlet<f64>,
    categories: usize,
}

impl DirichletCategorical {
    fn new(categories: usize) -> Result<Self, SweepError> {
        let prior = Dirichlet::new(vec![1.0; categories].as_slice())
            .map_err(|err| distribution_error("dirichlet_prior", err))?;
        Ok(Self { prior, categories })
    }

    fn data(&self, rng: &mut StdRng, theta: &[f64], rows: usize) -> Result<Vec<usize>, SweepError> {
        let likelihood =
            WeightedIndex::new(theta).map_err(|err| distribution_error("categorical", err))?;
        Ok((0..rows).map(|_| likelihood.sample(rng)).collect())
    }

    fn posterior(&self, rng: &mut StdRng, data: &[usize]) -> Result<Vec<f64>, SweepError> {
        let mut alpha = vec![1.0; self.categories];
        for &category in data {
            alpha[category] += 1.0;
        }
        Dirichlet::new(alpha.as_slice())
            .map(|posterior| posterior.sample(rng))
            .map_err(|err| distribution_error("dirichlet_posterior", err))
    }

    fn statistic(data: &[usize]) -> f64 {
        data.iter().filter(|&&category| category == 0).count() as f64 / data.len() as f64
    }

    fn forward(&self, rng: &mut StdRng, rows: usize, iters: usize) -> Result<Vec<f64>, SweepError> {
        (0..iters)
            .map(|_| {
                let theta = self.prior.sample(rng);
                self.data(rng, &theta, rows).map(|data| Self::statistic(&data))
            })
            .collect()
    }

    fn successive(&self, rng: &mut StdRng, rows: usize, iters: usize) -> Result<Vec<f64>, SweepError> {
        let theta = self.prior.sample(rng);
        let mut data = self.data(rng, &theta, rows)?;
        let mut samples = Vec::with_capacity(iters);
        for _ in 0..iters {
            let theta = self.posterior(rng, &data)?;
            data = self.data(rng, &theta, rows)?;
            samples.push(Self::statistic(&data));
        }
        Ok(samples)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Largest gap between the empirical CDFs of `a` and `b`.
///
/// Ties are stepped over together so equal samples never count as a gap.
pub fn ks_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let (mut i, mut j) = (0, 0);
    let mut distance: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        let gap = (i as f64 / a.len() as f64 - j as f64 / b.len() as f64).abs();
        distance = distance.max(gap);
    }
    distance
}
