//! Ownership of everything a run provisions, released exactly once.
//!
//! [`Resources`] is shared between the orchestrator and the interrupt
//! handler. Teardown drains the set while holding its lock, so a second
//! caller (a double interrupt, or the orchestrator finishing while a signal
//! arrives) waits for the first to finish and then finds nothing left to do.

use std::fs;
use std::io;
use std::mem;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ORCHESTRATOR_TARGET;
use super::readiness::ExitProbe;
use super::shutdown::{ManagedProcess, Termination, terminate};
use super::types::ProcessRole;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cleanup problems; logged, never allowed to change the exit code.
#[derive(Debug, Error)]
pub enum TeardownWarning {
    /// SIGTERM could not be delivered and no elevation program applied.
    #[error("failed to send SIGTERM to {role} pid {pid}: {source}")]
    Signal {
        role: ProcessRole,
        pid: u32,
        #[source]
        source: Errno,
    },
    /// The elevation program failed to signal a privileged process.
    #[error("failed to send SIGTERM to privileged {role} pid {pid}: {source}")]
    ElevatedSignal {
        role: ProcessRole,
        pid: u32,
        #[source]
        source: io::Error,
    },
    /// SIGKILL after the grace period failed.
    #[error("failed to kill {role} pid {pid}: {source}")]
    Kill {
        role: ProcessRole,
        pid: u32,
        #[source]
        source: io::Error,
    },
    /// The stopped process could not be waited on.
    #[error("failed to reap {role} pid {pid}: {source}")]
    Reap {
        role: ProcessRole,
        pid: u32,
        #[source]
        source: io::Error,
    },
    /// A provisioned directory or the isolated home could not be removed.
    #[error("failed to remove directory {path:?}: {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A process stopped during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppedProcess {
    /// What the process was.
    pub role: ProcessRole,
    /// Its pid.
    pub pid: u32,
    /// How it ended.
    pub termination: Termination,
}

/// Summary of one teardown pass.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Processes that were stopped or had already exited.
    pub stopped: Vec<StoppedProcess>,
    /// Directories that were removed.
    pub removed: Vec<PathBuf>,
    /// Problems encountered along the way.
    pub warnings: Vec<TeardownWarning>,
}

impl TeardownReport {
    /// True when every resource was released without a warning.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// True when this pass found nothing to release.
    pub fn is_noop(&self) -> bool {
        self.stopped.is_empty() && self.removed.is_empty() && self.warnings.is_empty()
    }

    /// Emits the report through tracing.
    pub fn log(&self) {
        for stopped in &self.stopped {
            debug!(
                target: ORCHESTRATOR_TARGET,
                role = %stopped.role,
                pid = stopped.pid,
                termination = ?stopped.termination,
                "process stopped"
            );
        }
        for path in &self.removed {
            debug!(
                target: ORCHESTRATOR_TARGET,
                path = %path.display(),
                "directory removed"
            );
        }
        for warning in &self.warnings {
            warn!(target: ORCHESTRATOR_TARGET, %warning, "teardown incomplete");
        }
        info!(
            target: ORCHESTRATOR_TARGET,
            processes = self.stopped.len(),
            directories = self.removed.len(),
            warnings = self.warnings.len(),
            "teardown finished"
        );
    }
}

#[derive(Debug, Default)]
struct ResourceSet {
    processes: Vec<ManagedProcess>,
    directories: Vec<PathBuf>,
    home: Option<TempDir>,
}

/// Shared handle to the resources provisioned by one run.
#[derive(Debug, Clone)]
pub struct Resources {
    inner: Arc<Mutex<ResourceSet>>,
    grace: Duration,
}

impl Resources {
    /// Creates an empty set whose processes get `grace` to exit after
    /// SIGTERM.
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResourceSet::default())),
            grace,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResourceSet> {
        // Teardown must still run after a panic elsewhere poisoned the lock.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn track_directory(&self, path: PathBuf) {
        let mut set = self.lock();
        if !set.directories.contains(&path) {
            set.directories.push(path);
        }
    }

    pub(crate) fn track_process(&self, process: ManagedProcess) -> u32 {
        let pid = process.child.id();
        self.lock().processes.push(process);
        pid
    }

    pub(crate) fn track_home(&self, home: TempDir) {
        self.lock().home = Some(home);
    }

    /// Exit probe for a tracked process.
    pub(crate) fn probe(&self, role: ProcessRole) -> TrackedProbe<'_> {
        TrackedProbe {
            resources: self,
            role,
        }
    }

    /// Blocks until the most recent process with `role` exits.
    ///
    /// The lock is released between polls so an interrupt can tear the
    /// process down; the wait then fails with `NotFound`.
    pub(crate) fn wait_for_exit(&self, role: ProcessRole) -> io::Result<ExitStatus> {
        let mut probe = self.probe(role);
        loop {
            if let Some(status) = probe.try_exit()? {
                return Ok(status);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    /// True when nothing remains to be released.
    pub fn is_empty(&self) -> bool {
        let set = self.lock();
        set.processes.is_empty() && set.directories.is_empty() && set.home.is_none()
    }

    /// Stops every tracked process and removes every tracked directory.
    ///
    /// Safe to call any number of times; calls after the first return an
    /// empty report.
    pub fn teardown(&self) -> TeardownReport {
        let mut set = self.lock();
        let mut report = TeardownReport::default();

        let mut processes = mem::take(&mut set.processes);
        // Reverse start order: the test run, then the daemon, then the
        // fixture injector.
        while let Some(mut process) = processes.pop() {
            let pid = process.child.id();
            if let Some(termination) = terminate(&mut process, self.grace, &mut report.warnings)
            {
                report.stopped.push(StoppedProcess {
                    role: process.role,
                    pid,
                    termination,
                });
            }
        }

        if let Some(home) = set.home.take() {
            let path = home.path().to_path_buf();
            match home.close() {
                Ok(()) => report.removed.push(path),
                Err(source) => report
                    .warnings
                    .push(TeardownWarning::RemoveDirectory { path, source }),
            }
        }

        let mut directories = mem::take(&mut set.directories);
        while let Some(path) = directories.pop() {
            match fs::remove_dir_all(&path) {
                Ok(()) => report.removed.push(path),
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => report
                    .warnings
                    .push(TeardownWarning::RemoveDirectory { path, source }),
            }
        }
        report
    }
}

/// [`ExitProbe`] that checks a tracked process under the resource lock.
pub(crate) struct TrackedProbe<'a> {
    resources: &'a Resources,
    role: ProcessRole,
}

impl ExitProbe for TrackedProbe<'_> {
    fn try_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        let mut set = self.resources.lock();
        let process = set
            .processes
            .iter_mut()
            .rev()
            .find(|process| process.role == self.role)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} was released by teardown", self.role),
                )
            })?;
        process.child.try_wait()
    }
}
