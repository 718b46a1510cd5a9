use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use gsw_core::errors::SweepError;
use gsw_store::ResultStore;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Result directory to scan.
    #[arg(long, default_value = "geweke_on_schemas")]
    pub dirname: PathBuf,
}

pub fn run(args: &ListArgs) -> Result<ExitCode, SweepError> {
    let keys = ResultStore::open(&args.dirname)?.list_keys()?;
    tracing::debug!(keys = keys.len(), root = %args.dirname.display(), "listed store");
    for key in keys {
        println!("{key}");
    }
    Ok(ExitCode::SUCCESS)
}
