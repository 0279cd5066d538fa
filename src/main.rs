//! parmake - parallel make
//!
//! CLI entry point: resolves the build file, starts the worker pool, and maps
//! the result to the exit status (0 on success, 1 on any failure).

use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode};

use clap::Parser;
use eyre::{Context, Result};
use parmake::BuildConfig;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "parmake", version, about = "Run build rules in parallel on a fixed worker pool")]
struct Cli {
    /// Build file to read (default: ./makefile, then ./Makefile)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    file: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value = "1")]
    jobs: NonZeroUsize,

    /// Run commands and resolve file names in DIR
    #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Targets to bring up to date (default: the first rule in the build file)
    targets: Vec<String>,
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level `{level}`"))?,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
    debug!(%level, "logging initialized");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        file,
        jobs,
        directory,
        log_level: _,
        targets,
    } = cli;
    let config = BuildConfig::resolve(directory, file.as_deref(), jobs, targets)
        .context("invalid build configuration")?;
    info!(
        build_file = %config.build_file.display(),
        jobs = config.jobs.get(),
        targets = ?config.targets,
        "starting build"
    );

    let report = parmake::build(&config)
        .wrap_err_with(|| format!("build from `{}` failed", config.build_file.display()))?;
    info!(
        completed = report.completed().count(),
        ran = report.ran().count(),
        up_to_date = report.up_to_date().count(),
        "build finished"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not failures.
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    if let Err(err) = setup_logging(&cli.log_level) {
        eprintln!("parmake: {err:?}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("parmake: {err:?}");
            ExitCode::FAILURE
        }
    }
}
