//! Exit code conventions shared by the library and the binary.

use std::process::{ExitCode, ExitStatus};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// Exit code for configuration, dependency, and setup failures.
///
/// 125 matches the convention of `env`, `timeout`, and `git bisect run` for
/// "the wrapper failed", so CI can tell it apart from a test failure.
pub const SETUP_FAILURE_EXIT: u8 = 125;

/// Base added to a signal number when a process dies from that signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Exit code reported for the setup-failure sentinel.
pub fn setup_failure() -> ExitCode {
    ExitCode::from(SETUP_FAILURE_EXIT)
}

/// Converts a raw status into an [`ExitCode`], clamping out-of-range values.
pub(crate) fn exit_code_from_status(status: i32) -> ExitCode {
    match u8::try_from(status) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}

/// Shell-style code for a finished process: its exit code, or
/// `128 + signal` when it was killed.
pub(crate) fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    terminating_signal(status).map_or(i32::from(u8::MAX), |signal| SIGNAL_EXIT_BASE + signal)
}

#[cfg(unix)]
fn terminating_signal(status: ExitStatus) -> Option<i32> {
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: ExitStatus) -> Option<i32> {
    None
}
