//! Shared configuration for the simulated-hardware test harness.
//!
//! [`Config`] layers defaults, an optional configuration file, environment
//! variables prefixed with `CHROMA_HARNESS_`, and command-line flags through
//! `ortho_config`. [`RuntimeLayout`] derives the directories a harness run
//! provisions underneath the temporary root.

mod defaults;
mod layout;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DAEMON_PID_FILE, DEFAULT_DAEMON_READY_TIMEOUT, DEFAULT_ELEVATION_PROGRAM,
    DEFAULT_FIXTURE_ENTRY, DEFAULT_FIXTURE_TIMEOUT, DEFAULT_IMPORT_PATH_VAR, DEFAULT_LAUNCHER,
    DEFAULT_LOG_FILTER, DEFAULT_TERMINATION_GRACE, DEFAULT_TEST_ENTRY, default_daemon_pid_file,
    default_daemon_ready_timeout_ms, default_elevation_program, default_fixture_entry,
    default_fixture_timeout_ms, default_import_path_var, default_launcher, default_log_filter,
    default_log_filter_string, default_log_format, default_termination_grace_ms,
    default_test_entry,
};
pub use layout::{
    HOME_DIR_PREFIX, LOG_DIR_NAME, RUN_DIR_NAME, RuntimeLayout, RuntimeLayoutError,
    TEST_DIR_NAME,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Flags consumed by the configuration loader rather than the harness CLI.
pub const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--daemon-source",
    "--repo-root",
    "--temp-root",
    "--unattended",
    "--launcher",
    "--elevation-program",
    "--fixture-entry",
    "--test-entry",
    "--import-path-var",
    "--daemon-pid-file",
    "--fixture-timeout-ms",
    "--daemon-ready-timeout-ms",
    "--termination-grace-ms",
    "--log-filter",
    "--log-format",
];

/// Flags from [`CONFIG_CLI_FLAGS`] that never take a value.
pub const CONFIG_CLI_SWITCHES: &[&str] = &["--unattended"];

/// Harness configuration resolved from every configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CHROMA_HARNESS")]
pub struct Config {
    /// Root of the daemon source tree holding the fixture entry point.
    #[serde(default)]
    pub daemon_source: Option<Utf8PathBuf>,
    /// Repository root exported on the import path; defaults to the working
    /// directory.
    #[serde(default)]
    pub repo_root: Option<Utf8PathBuf>,
    /// Parent of every provisioned directory; defaults to the system
    /// temporary directory.
    #[serde(default)]
    pub temp_root: Option<Utf8PathBuf>,
    /// Forces the unattended (privileged) daemon launch.
    #[serde(default)]
    pub unattended: bool,
    /// Daemon launcher resolved on the command search path.
    #[serde(default = "defaults::default_launcher")]
    pub launcher: String,
    /// Program prefixed to the launcher when running unattended.
    #[serde(default = "defaults::default_elevation_program")]
    pub elevation_program: String,
    /// Fixture entry point relative to the daemon source tree.
    #[serde(default = "defaults::default_fixture_entry")]
    pub fixture_entry: Utf8PathBuf,
    /// Test entry point relative to the repository root.
    #[serde(default = "defaults::default_test_entry")]
    pub test_entry: Utf8PathBuf,
    /// Environment variable receiving the repository root.
    #[serde(default = "defaults::default_import_path_var")]
    pub import_path_var: String,
    /// Pid file name the daemon writes into its run directory.
    #[serde(default = "defaults::default_daemon_pid_file")]
    pub daemon_pid_file: String,
    /// Fixture settle budget in milliseconds.
    #[serde(default = "defaults::default_fixture_timeout_ms")]
    pub fixture_timeout_ms: u64,
    /// Daemon readiness budget in milliseconds.
    #[serde(default = "defaults::default_daemon_ready_timeout_ms")]
    pub daemon_ready_timeout_ms: u64,
    /// Grace period between SIGTERM and SIGKILL in milliseconds.
    #[serde(default = "defaults::default_termination_grace_ms")]
    pub termination_grace_ms: u64,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_source: None,
            repo_root: None,
            temp_root: None,
            unattended: false,
            launcher: default_launcher(),
            elevation_program: default_elevation_program(),
            fixture_entry: default_fixture_entry(),
            test_entry: default_test_entry(),
            import_path_var: default_import_path_var(),
            daemon_pid_file: default_daemon_pid_file(),
            fixture_timeout_ms: default_fixture_timeout_ms(),
            daemon_ready_timeout_ms: default_daemon_ready_timeout_ms(),
            termination_grace_ms: default_termination_grace_ms(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Configured daemon source tree, if any.
    pub fn daemon_source(&self) -> Option<&Utf8Path> {
        self.daemon_source.as_deref()
    }

    /// Configured repository root, if any.
    pub fn repo_root(&self) -> Option<&Utf8Path> {
        self.repo_root.as_deref()
    }

    /// Configured temporary root, if any.
    pub fn temp_root(&self) -> Option<&Utf8Path> {
        self.temp_root.as_deref()
    }

    /// Whether the unattended launch was requested explicitly.
    pub fn unattended(&self) -> bool {
        self.unattended
    }

    /// Daemon launcher program name.
    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    /// Privilege elevation program name.
    pub fn elevation_program(&self) -> &str {
        &self.elevation_program
    }

    /// Fixture entry point relative to the daemon source.
    pub fn fixture_entry(&self) -> &Utf8Path {
        &self.fixture_entry
    }

    /// Test entry point relative to the repository root.
    pub fn test_entry(&self) -> &Utf8Path {
        &self.test_entry
    }

    /// Environment variable receiving the repository root.
    pub fn import_path_var(&self) -> &str {
        &self.import_path_var
    }

    /// Pid file name written by the daemon.
    pub fn daemon_pid_file(&self) -> &str {
        &self.daemon_pid_file
    }

    /// Fixture settle budget.
    pub fn fixture_timeout(&self) -> Duration {
        Duration::from_millis(self.fixture_timeout_ms)
    }

    /// Daemon readiness budget.
    pub fn daemon_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.daemon_ready_timeout_ms)
    }

    /// Grace period between SIGTERM and SIGKILL.
    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    /// Tracing filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
