pub mod grid;
pub mod list;
pub mod sweep;
pub mod worker;

use clap::Args;
use gsw_pool::TaskRegistry;
use gsw_run::register_experiment_tasks;

use crate::geweke::{ChainTask, GewekeTask};
use crate::logging::LogConfig;
use crate::render::{HistogramNorm, RenderOpts, RenderTask};

/// Some configurations have no result.
pub const EXIT_PARTIAL: u8 = 2;
/// A worker process died and the batch was aborted.
pub const EXIT_POOL_FAILURE: u8 = 3;

/// Options every process of a sweep must agree on, workers included.
#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Column chains run concurrently inside one configuration.
    #[arg(long, default_value_t = 2)]
    pub chain_workers: usize,
    /// Histogram scaling for the plots.
    #[arg(long, value_enum, default_value_t = HistogramNorm::Density)]
    pub histogram_norm: HistogramNorm,
}

impl TaskArgs {
    /// Arguments that start a worker with the same options.
    pub fn worker_args(&self, log: &LogConfig) -> Vec<String> {
        vec![
            "worker".to_string(),
            "--chain-workers".to_string(),
            self.chain_workers.to_string(),
            "--histogram-norm".to_string(),
            self.histogram_norm.as_str().to_string(),
            "--log-level".to_string(),
            log.level.to_string(),
            "--log-format".to_string(),
            log.format.to_string(),
        ]
    }

    pub fn compute(&self, log: &LogConfig) -> GewekeTask {
        GewekeTask::new(self.chain_workers).with_worker_args(self.worker_args(log))
    }

    pub fn render(&self) -> RenderTask {
        RenderTask::new(RenderOpts {
            norm: self.histogram_norm,
            ..RenderOpts::default()
        })
    }

    /// Everything a worker may be asked to run.
    pub fn registry(&self, log: &LogConfig) -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        register_experiment_tasks(&mut registry, self.compute(log), self.render());
        registry.register(ChainTask);
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geweke::{CHAIN_TASK, GEWEKE_TASK};
    use crate::render::RENDER_TASK;

    #[test]
    fn registry_serves_every_task_of_a_sweep() {
        let args = TaskArgs {
            chain_workers: 2,
            histogram_norm: HistogramNorm::Counts,
        };
        let registry = args.registry(&LogConfig::default());
        let names: Vec<&str> = registry.names().collect();
        let persist = format!("persist:{GEWEKE_TASK}");
        assert!(names.contains(&persist.as_str()));
        assert!(names.contains(&RENDER_TASK));
        assert!(names.contains(&CHAIN_TASK));
    }

    #[test]
    fn worker_args_carry_the_render_options() {
        let args = TaskArgs {
            chain_workers: 3,
            histogram_norm: HistogramNorm::Counts,
        };
        let tokens = args.worker_args(&LogConfig::default());
        assert_eq!(tokens[0], "worker");
        assert!(tokens.windows(2).any(|pair| pair == ["--histogram-norm", "counts"]));
        assert!(tokens.windows(2).any(|pair| pair == ["--chain-workers", "3"]));
        assert!(tokens.windows(2).any(|pair| pair == ["--log-level", "info"]));
    }
}
