//! Test-harness runtime for a device-control daemon.
//!
//! The harness quiesces any running daemon, injects simulated devices,
//! starts a fresh daemon against them, runs the integration suite with an
//! isolated home directory, and tears everything down again. The test run's
//! exit code becomes the harness exit code; harness failures exit with
//! [`SETUP_FAILURE_EXIT`].

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};

mod cli;
mod config;
mod errors;
mod exit;
pub mod orchestrator;
pub mod telemetry;

use cli::Cli;
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;
pub use exit::{SETUP_FAILURE_EXIT, SIGNAL_EXIT_BASE};
use orchestrator::{
    Environment, Orchestrator, ProcessEnvironment, Stage, install_interrupts, resolve_plan,
};

/// Tracing target for runtime events outside the orchestrator.
const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Runs the harness with the process environment.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &OrthoConfigLoader, &ProcessEnvironment)
}

/// Runs the harness with substitutable configuration and environment.
pub(crate) fn run_with<I, W, E, L, V>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    environment: &V,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    V: Environment,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(&split.cli_arguments) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => return report_early(stderr, &AppError::CliUsage(error)),
    };
    let config = match loader.load(&split.config_arguments) {
        Ok(config) => config,
        Err(error) => return report_early(stderr, &error),
    };
    if let Err(error) = telemetry::initialise(&config) {
        return report_early(stderr, &AppError::from(error));
    }

    match execute(&cli, &config, environment) {
        Ok(code) => code,
        Err(error) => {
            error!(
                target: RUNTIME_TARGET,
                kind = %error.kind(),
                %error,
                "harness failed"
            );
            exit::setup_failure()
        }
    }
}

fn execute<V: Environment>(
    cli: &Cli,
    config: &chroma_config::Config,
    environment: &V,
) -> Result<ExitCode, AppError> {
    info!(target: RUNTIME_TARGET, stage = %Stage::Preconditions, "stage started");
    let plan = resolve_plan(config, cli.daemon_source.as_deref(), environment)?;
    let mut orchestrator = Orchestrator::new(plan);
    let _interrupts = install_interrupts(orchestrator.resources())?;
    let outcome = orchestrator.run()?;
    info!(target: RUNTIME_TARGET, code = outcome.code(), "harness finished");
    Ok(outcome.exit_code())
}

/// Reports a failure that happened before logging was configured.
fn report_early<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    let _ = writeln!(stderr, "chroma-harness: {} error: {error}", error.kind());
    exit::setup_failure()
}
