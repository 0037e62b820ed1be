//! Default values shared by the configuration model and the harness binary.
//!
//! The names mirror the contract of the daemon under test: the launcher
//! accepts foreground/run-dir/log-dir/test-dir flags and writes a pid file
//! into its run directory once it is serving.

use std::time::Duration;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Daemon launcher resolved on the command search path.
pub const DEFAULT_LAUNCHER: &str = "openrazer-daemon";

/// Program prefixed to the launcher for privileged starts.
pub const DEFAULT_ELEVATION_PROGRAM: &str = "sudo";

/// Fixture provisioning entry point, relative to the daemon source tree.
pub const DEFAULT_FIXTURE_ENTRY: &str = "scripts/create_fake_device.py";

/// Test entry point, relative to the repository root.
pub const DEFAULT_TEST_ENTRY: &str = "tests/run_daemon_tests.py";

/// Environment variable receiving the repository root.
pub const DEFAULT_IMPORT_PATH_VAR: &str = "PYTHONPATH";

/// Pid file written by the daemon into its run directory.
pub const DEFAULT_DAEMON_PID_FILE: &str = "openrazer-daemon.pid";

/// Upper bound for fixture files to appear in the test-data directory.
///
/// Fixture generation is a short file-writing script; five seconds covers a
/// cold interpreter start on a loaded CI worker.
pub const DEFAULT_FIXTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for the daemon to write its pid file.
///
/// The daemon enumerates every fake device before it reports itself up, so
/// this grows with the fixture inventory.
pub const DEFAULT_DAEMON_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period between SIGTERM and SIGKILL during teardown.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(3);

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned launcher name used where allocation is required (e.g. serde).
pub fn default_launcher() -> String {
    DEFAULT_LAUNCHER.to_owned()
}

/// Owned elevation program name.
pub fn default_elevation_program() -> String {
    DEFAULT_ELEVATION_PROGRAM.to_owned()
}

/// Default fixture entry point.
pub fn default_fixture_entry() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_FIXTURE_ENTRY)
}

/// Default test entry point.
pub fn default_test_entry() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_TEST_ENTRY)
}

/// Owned import path variable name.
pub fn default_import_path_var() -> String {
    DEFAULT_IMPORT_PATH_VAR.to_owned()
}

/// Owned daemon pid file name.
pub fn default_daemon_pid_file() -> String {
    DEFAULT_DAEMON_PID_FILE.to_owned()
}

/// Fixture settle budget in milliseconds.
pub fn default_fixture_timeout_ms() -> u64 {
    duration_ms(DEFAULT_FIXTURE_TIMEOUT)
}

/// Daemon readiness budget in milliseconds.
pub fn default_daemon_ready_timeout_ms() -> u64 {
    duration_ms(DEFAULT_DAEMON_READY_TIMEOUT)
}

/// Termination grace period in milliseconds.
pub fn default_termination_grace_ms() -> u64 {
    duration_ms(DEFAULT_TERMINATION_GRACE)
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
