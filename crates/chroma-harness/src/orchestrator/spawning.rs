//! Command construction for every process the harness starts.
//!
//! Builders are separate from spawning so the exact argument vectors can be
//! asserted without launching anything.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command, Stdio};

use super::error::HarnessError;
use super::plan::HarnessPlan;
use super::provision::IsolatedHome;
use super::types::ProcessRole;

/// Requests that any daemon owned by the current user stops.
pub const STOP_FLAG: &str = "--stop";
/// Keeps the daemon attached instead of forking.
pub const FOREGROUND_FLAG: &str = "--foreground";
/// Daemon runtime directory flag.
pub const RUN_DIR_FLAG: &str = "--run-dir";
/// Daemon log directory flag.
pub const LOG_DIR_FLAG: &str = "--log-dir";
/// Directory of fake devices the daemon enumerates.
pub const TEST_DIR_FLAG: &str = "--test-dir";
/// Tells the daemon it was deliberately started as root.
pub const AS_ROOT_FLAG: &str = "--as-root";
/// Fixture destination flag.
pub const FIXTURE_DEST_FLAG: &str = "--dest";
/// Suppresses fixture prompts.
pub const FIXTURE_NON_INTERACTIVE_FLAG: &str = "--non-interactive";
/// Requests every fake device category.
pub const FIXTURE_ALL_FLAG: &str = "--all";

/// Builds the idempotent daemon stop request.
pub(super) fn stop_command(plan: &HarnessPlan) -> Command {
    let mut command = Command::new(plan.launcher());
    command
        .arg(STOP_FLAG)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// Builds the fixture injector targeting the test-data directory.
pub(super) fn fixture_command(plan: &HarnessPlan) -> Command {
    let mut command = Command::new(plan.fixture_entry());
    command
        .arg(FIXTURE_DEST_FLAG)
        .arg(plan.layout().test_dir())
        .arg(FIXTURE_NON_INTERACTIVE_FLAG)
        .arg(FIXTURE_ALL_FLAG)
        .current_dir(plan.daemon_source())
        .stdin(Stdio::null());
    command
}

/// Builds the foreground-mode daemon launch.
///
/// Unattended launches run the launcher through the elevation program and
/// pass [`AS_ROOT_FLAG`].
pub(super) fn daemon_command(plan: &HarnessPlan) -> Command {
    let layout = plan.layout();
    let mut command = match plan.elevation() {
        Some(elevation) => {
            let mut command = Command::new(elevation);
            command.arg(plan.launcher());
            command
        }
        None => Command::new(plan.launcher()),
    };
    command
        .arg(FOREGROUND_FLAG)
        .arg(RUN_DIR_FLAG)
        .arg(layout.run_dir())
        .arg(LOG_DIR_FLAG)
        .arg(layout.log_dir())
        .arg(TEST_DIR_FLAG)
        .arg(layout.test_dir());
    if plan.elevation().is_some() {
        command.arg(AS_ROOT_FLAG);
    }
    command.stdin(Stdio::null());
    command
}

/// Builds the foreground test run with its home redirected.
///
/// Output streams are inherited untouched so the harness stays a
/// transparent wrapper.
pub(super) fn test_command(plan: &HarnessPlan, home: &IsolatedHome) -> Command {
    let mut command = Command::new(plan.test_entry());
    command
        .current_dir(plan.repo_root())
        .env("HOME", home.root())
        .env("XDG_CONFIG_HOME", home.config_dir())
        .env("XDG_CACHE_HOME", home.cache_dir())
        .env(plan.import_path_var(), plan.repo_root())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    command
}

/// Spawns a prepared command, attributing failures to `role`.
pub(super) fn spawn(role: ProcessRole, command: &mut Command) -> Result<Child, HarnessError> {
    command.spawn().map_err(|source| HarnessError::Spawn {
        role,
        program: Path::new(command.get_program()).to_path_buf(),
        source,
    })
}

/// Renders a command for log output.
pub(super) fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(
        command
            .get_args()
            .map(|arg: &OsStr| arg.to_string_lossy().into_owned()),
    );
    parts.join(" ")
}
