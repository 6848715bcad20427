use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mason_tests::suite::{self, RunConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "mason golden-output regression harness", long_about = None)]
struct Cli {
    /// Source root; fixtures and golden files live in its tests/ directory
    source_root: PathBuf,
    /// Build root searched for the mason executables (bin/ and build-config variants)
    binary_root: PathBuf,
    /// Only run tests whose command line contains this filter
    #[arg(short, long)]
    filter: Option<String>,
    /// Print per-test execution details
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
    /// Leave the temporary output directory in place after the run
    #[arg(long, default_value_t = false)]
    keep_temp: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RunConfig {
        filter: cli.filter,
        keep_temp: cli.keep_temp,
        ..RunConfig::new(cli.source_root, cli.binary_root)
    };
    match suite::run(&config, io::stdout().lock()) {
        Ok(summary) if summary.success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .try_init();
}
