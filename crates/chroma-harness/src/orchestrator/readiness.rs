//! Readiness probes for the fixture injector and the daemon.
//!
//! Both probes poll with a bounded overall timeout instead of sleeping for
//! a fixed interval, and both fail fast when the watched process exits in a
//! way that can never lead to readiness.

use std::io;
use std::path::Path;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use cap_std::ambient_authority;
use cap_std::fs::Dir;

use super::error::HarnessError;
use super::types::ProcessRole;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Non-blocking exit check for a watched process.
pub(crate) trait ExitProbe {
    /// Returns the exit status once the process has finished.
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>>;
}

impl ExitProbe for Child {
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        self.try_wait()
    }
}

/// Synthetic device inventory observed once fixtures settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureInventory {
    /// Number of device entries in the test-data directory.
    pub devices: usize,
}

/// Evidence that the daemon is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonReady {
    /// Pid recorded by the daemon itself.
    pub pid: u32,
}

/// Result of evaluating one probe iteration.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) enum ProbeOutcome<T> {
    /// The watched resource is usable.
    Ready(T),
    /// Nothing actionable yet; polling should continue.
    Continue,
}

/// Waits for the fixture injector to populate `test_dir`.
///
/// Fixtures are settled once the injector exits successfully with devices on
/// disk, or while it is still running once the device count is non-zero and
/// unchanged across two consecutive polls.
pub(super) fn wait_for_fixtures<P: ExitProbe>(
    test_dir: &Path,
    injector: &mut P,
    timeout: Duration,
) -> Result<FixtureInventory, HarnessError> {
    let dir = open_dir(test_dir).map_err(|source| HarnessError::ReadFixtures {
        path: test_dir.to_path_buf(),
        source,
    })?;
    let deadline = Instant::now() + timeout;
    let mut previous = None;
    loop {
        // Sample the exit status before counting so a finished injector is
        // judged on its final output.
        let exit = injector
            .try_exit()
            .map_err(|source| HarnessError::MonitorChild {
                role: ProcessRole::Fixture,
                source,
            })?;
        let devices = count_entries(&dir).map_err(|source| HarnessError::ReadFixtures {
            path: test_dir.to_path_buf(),
            source,
        })?;
        if let ProbeOutcome::Ready(inventory) =
            evaluate_fixtures(exit, devices, previous, test_dir)?
        {
            return Ok(inventory);
        }
        previous = Some(devices);
        if Instant::now() >= deadline {
            return Err(HarnessError::FixtureTimeout {
                path: test_dir.to_path_buf(),
                timeout_ms: millis(timeout),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Evaluates one fixture probe sample.
pub(crate) fn evaluate_fixtures(
    exit: Option<ExitStatus>,
    devices: usize,
    previous: Option<usize>,
    test_dir: &Path,
) -> Result<ProbeOutcome<FixtureInventory>, HarnessError> {
    match exit {
        Some(status) if !status.success() => Err(HarnessError::FixturesFailed {
            exit_status: status.code(),
        }),
        Some(_) if devices == 0 => Err(HarnessError::FixturesMissing {
            path: test_dir.to_path_buf(),
        }),
        Some(_) => Ok(ProbeOutcome::Ready(FixtureInventory { devices })),
        None if devices > 0 && previous == Some(devices) => {
            Ok(ProbeOutcome::Ready(FixtureInventory { devices }))
        }
        None => Ok(ProbeOutcome::Continue),
    }
}

/// Waits for the daemon to write its pid file into `run_dir`.
///
/// The launched process must stay alive: in foreground mode any exit before
/// the pid file appears is a failed start.
pub(super) fn wait_for_daemon<P: ExitProbe>(
    run_dir: &Path,
    pid_file: &str,
    daemon: &mut P,
    timeout: Duration,
) -> Result<DaemonReady, HarnessError> {
    let dir = open_dir(run_dir).map_err(|source| HarnessError::OpenRunDir {
        path: run_dir.to_path_buf(),
        source,
    })?;
    let pid_path = run_dir.join(pid_file);
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = daemon
            .try_exit()
            .map_err(|source| HarnessError::MonitorChild {
                role: ProcessRole::Daemon,
                source,
            })?
        {
            return Err(HarnessError::DaemonExited {
                exit_status: status.code(),
            });
        }
        let pid = read_pid(&dir, pid_file).map_err(|source| HarnessError::ReadPid {
            path: pid_path.clone(),
            source,
        })?;
        if let Some(pid) = pid {
            return Ok(DaemonReady { pid });
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::DaemonTimeout {
                pid_path,
                timeout_ms: millis(timeout),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Reads the daemon pid, treating a missing, empty, or partially written
/// file as "not yet".
pub(crate) fn read_pid(dir: &Dir, filename: &str) -> io::Result<Option<u32>> {
    let Some(content) = read_optional_file(dir, filename)? else {
        return Ok(None);
    };
    Ok(content.trim().parse::<u32>().ok())
}

fn read_optional_file(dir: &Dir, filename: &str) -> io::Result<Option<String>> {
    match dir.read_to_string(filename) {
        Ok(content) => Ok(Some(content)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

fn count_entries(dir: &Dir) -> io::Result<usize> {
    let mut count = 0;
    for entry in dir.entries()? {
        entry?;
        count += 1;
    }
    Ok(count)
}

pub(crate) fn open_dir(path: &Path) -> io::Result<Dir> {
    Dir::open_ambient_dir(path, ambient_authority())
}

/// Whole milliseconds in `duration`, saturating.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
