//! Process termination for teardown.
//!
//! Processes receive SIGTERM, get a grace period to exit, and are then
//! killed. Every step tolerates a process that is already gone so teardown
//! can run after any partial setup.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::debug;

use super::ORCHESTRATOR_TARGET;
use super::readiness::millis;
use super::resources::TeardownWarning;
use super::types::ProcessRole;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A child process owned by the harness.
#[derive(Debug)]
pub(crate) struct ManagedProcess {
    pub(crate) role: ProcessRole,
    pub(crate) child: Child,
    /// Elevation program used to start the process, when privileged.
    pub(crate) elevation: Option<PathBuf>,
}

/// How a managed process ended during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process had already exited on its own.
    AlreadyExited(ExitStatus),
    /// The process exited after SIGTERM.
    Terminated(ExitStatus),
    /// The process ignored SIGTERM and was killed.
    Killed(ExitStatus),
}

/// Stops `process`, escalating from SIGTERM to SIGKILL after `grace`.
///
/// Returns `None` when the process could not be stopped; the reasons are
/// pushed onto `warnings`.
pub(crate) fn terminate(
    process: &mut ManagedProcess,
    grace: Duration,
    warnings: &mut Vec<TeardownWarning>,
) -> Option<Termination> {
    terminate_with(process, grace, warnings, signal_terminate)
}

/// [`terminate`] with the SIGTERM delivery supplied by the caller.
pub(crate) fn terminate_with(
    process: &mut ManagedProcess,
    grace: Duration,
    warnings: &mut Vec<TeardownWarning>,
    signal: impl FnOnce(u32) -> Result<(), Errno>,
) -> Option<Termination> {
    let role = process.role;
    let pid = process.child.id();
    match process.child.try_wait() {
        Ok(Some(status)) => return Some(Termination::AlreadyExited(status)),
        Ok(None) => {}
        Err(source) => warnings.push(TeardownWarning::Reap { role, pid, source }),
    }

    match (signal(pid), process.elevation.as_deref()) {
        (Ok(()) | Err(Errno::ESRCH), _) => {}
        (Err(Errno::EPERM), Some(elevation)) => {
            if let Err(source) = elevated_terminate(elevation, pid) {
                warnings.push(TeardownWarning::ElevatedSignal { role, pid, source });
            }
        }
        (Err(source), _) => warnings.push(TeardownWarning::Signal { role, pid, source }),
    }

    match wait_with_deadline(&mut process.child, grace) {
        Ok(Some(status)) => return Some(Termination::Terminated(status)),
        Ok(None) => {}
        Err(source) => warnings.push(TeardownWarning::Reap { role, pid, source }),
    }

    debug!(
        target: ORCHESTRATOR_TARGET,
        %role,
        pid,
        grace_ms = millis(grace),
        "process ignored SIGTERM; killing"
    );
    if let Err(source) = process.child.kill() {
        warnings.push(TeardownWarning::Kill { role, pid, source });
        return None;
    }
    match process.child.wait() {
        Ok(status) => Some(Termination::Killed(status)),
        Err(source) => {
            warnings.push(TeardownWarning::Reap { role, pid, source });
            None
        }
    }
}

/// Polls `child` until it exits or `timeout` elapses.
pub(crate) fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Sends SIGTERM to `pid`.
///
/// An out-of-range pid is reported as `ESRCH`: no such process can exist.
pub(crate) fn signal_terminate(pid: u32) -> Result<(), Errno> {
    let raw = i32::try_from(pid).map_err(|_| Errno::ESRCH)?;
    kill(Pid::from_raw(raw), Signal::SIGTERM)
}

/// Delivers SIGTERM through the elevation program when the target runs with
/// privileges the harness lacks.
fn elevated_terminate(elevation: &Path, pid: u32) -> io::Result<()> {
    let status = Command::new(elevation)
        .args(["kill", "-s", "TERM"])
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("elevated kill exited with {status}")))
    }
}
