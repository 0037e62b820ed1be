//! Command-line interface definition for the harness.

use camino::Utf8PathBuf;
use clap::Parser;

const CONFIG_HELP: &str = "\
Configuration flags (also settable through CHROMA_HARNESS_* variables or a
configuration file passed with --config-path):
  --daemon-source <PATH>          daemon source tree
  --repo-root <PATH>              repository exported on the import path
  --temp-root <PATH>              parent of every provisioned directory
  --unattended                    start the daemon through the elevation program
  --launcher <NAME>               daemon launcher program
  --elevation-program <NAME>      privilege elevation program
  --fixture-entry <PATH>          fixture entry point inside the daemon source
  --test-entry <PATH>             test entry point inside the repository
  --import-path-var <NAME>        variable receiving the repository root
  --daemon-pid-file <NAME>        pid file written by the daemon
  --fixture-timeout-ms <MS>       fixture settle budget
  --daemon-ready-timeout-ms <MS>  daemon readiness budget
  --termination-grace-ms <MS>     grace period before SIGKILL
  --log-filter <FILTER>           tracing filter expression
  --log-format <json|compact>     log output format

Exit status is the test run's own code, or 125 when the harness itself failed.";

/// Boots a device-control daemon against fake hardware and runs the
/// integration suite with an isolated home directory.
#[derive(Parser, Debug)]
#[command(name = "chroma-harness", version, after_help = CONFIG_HELP)]
pub(crate) struct Cli {
    /// Path to the daemon source tree; overrides the configured value.
    #[arg(value_name = "DAEMON_SOURCE")]
    pub(crate) daemon_source: Option<Utf8PathBuf>,
}
