use std::process::ExitCode;

use clap::Args;
use gsw_config::{geweke_schema, generate_configs, GridSpec, CONTINUOUS, MULTINOMIAL};
use gsw_core::errors::SweepError;

#[derive(Args, Debug)]
pub struct GridArgs {
    /// Row count of the regular grid entries.
    #[arg(long, default_value_t = 10)]
    pub base_num_rows: i64,
    /// Draws per column.
    #[arg(long, default_value_t = 200)]
    pub num_iters: i64,
    /// Include the large hand-picked configurations.
    #[arg(long)]
    pub do_long: bool,
}

pub fn run(args: &GridArgs) -> Result<ExitCode, SweepError> {
    let spec = GridSpec::new(
        args.base_num_rows,
        args.num_iters,
        vec![CONTINUOUS.to_string(), MULTINOMIAL.to_string()],
    )
    .with_extended(args.do_long);
    for config in generate_configs(&geweke_schema(), &spec)? {
        println!("{}\t{}", config.storage_key(), config.to_arg_list());
    }
    Ok(ExitCode::SUCCESS)
}
