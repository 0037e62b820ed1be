//! Error types for harness orchestration.

use std::fmt;
use std::io;
use std::path::PathBuf;

use chroma_config::RuntimeLayoutError;
use thiserror::Error;

use super::types::ProcessRole;

/// Broad classes of fatal harness failures.
///
/// Every class exits with the setup-failure sentinel; the class is logged so
/// operators can tell a broken environment from a missing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The daemon source or harness configuration is unusable.
    Configuration,
    /// A required external program is not on the search path.
    DependencyMissing,
    /// Provisioning, fixture injection, or daemon start did not complete.
    Setup,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Configuration => "configuration",
            Self::DependencyMissing => "dependency-missing",
            Self::Setup => "setup",
        })
    }
}

/// Errors raised while preparing or driving a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Neither the command line nor configuration named a daemon source.
    #[error(
        "daemon source path is not configured; pass DAEMON_SOURCE or set CHROMA_HARNESS_DAEMON_SOURCE"
    )]
    MissingDaemonSource,
    /// The daemon source path is not an existing directory.
    #[error("daemon source {path:?} does not exist or is not a directory")]
    DaemonSourceNotFound { path: PathBuf },
    /// The daemon source has no fixture injector at the configured entry.
    #[error("fixture entry point {path:?} is missing from the daemon source")]
    FixtureEntryMissing { path: PathBuf },
    /// The repository has no test suite at the configured entry.
    #[error("test entry point {path:?} is missing from the repository")]
    TestEntryMissing { path: PathBuf },
    /// The repository root defaulted to a working directory that could not be read.
    #[error("failed to resolve the working directory: {source}")]
    WorkingDirectory {
        #[source]
        source: io::Error,
    },
    /// The temp root could not host the runtime layout.
    #[error(transparent)]
    Layout(#[from] RuntimeLayoutError),
    /// A launcher or elevation program is not installed.
    #[error("'{program}' was not found on PATH")]
    ProgramNotFound { program: String },
    /// A stable runtime directory could not be emptied and recreated.
    #[error("failed to reset directory {path:?}: {source}")]
    ResetDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The throwaway home directory could not be created.
    #[error("failed to create isolated home under {path:?}: {source}")]
    CreateHome {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The isolated home resolves inside the real configuration or cache.
    #[error("isolated directory {path:?} overlaps the invoking user's {kind} directory {real:?}")]
    HomeNotIsolated {
        path: PathBuf,
        real: PathBuf,
        kind: &'static str,
    },
    /// A child process could not be started.
    #[error("failed to spawn {role} '{program:?}': {source}")]
    Spawn {
        role: ProcessRole,
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Polling a tracked child for exit failed.
    #[error("failed to monitor {role}: {source}")]
    MonitorChild {
        role: ProcessRole,
        #[source]
        source: io::Error,
    },
    /// The fixture directory could not be listed.
    #[error("failed to inspect fixture directory {path:?}: {source}")]
    ReadFixtures {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The fixture injector exited non-zero.
    #[error("fixture injector exited unsuccessfully (status: {exit_status:?})")]
    FixturesFailed { exit_status: Option<i32> },
    /// The fixture injector exited zero but produced no devices.
    #[error("fixture injector exited without writing any devices to {path:?}")]
    FixturesMissing { path: PathBuf },
    /// Fixtures did not settle before the fixture deadline.
    #[error("timed out after {timeout_ms} ms waiting for fixtures in {path:?}")]
    FixtureTimeout { path: PathBuf, timeout_ms: u64 },
    /// The daemon run directory could not be opened.
    #[error("failed to open run directory {path:?}: {source}")]
    OpenRunDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The daemon pid file exists but could not be read.
    #[error("failed to read pid file {path:?}: {source}")]
    ReadPid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The daemon exited before writing its pid file.
    #[error("daemon exited before reporting ready (status: {exit_status:?})")]
    DaemonExited { exit_status: Option<i32> },
    /// The daemon did not write its pid file before the readiness deadline.
    #[error("timed out after {timeout_ms} ms waiting for daemon pid file {pid_path:?}")]
    DaemonTimeout { pid_path: PathBuf, timeout_ms: u64 },
    /// The test run could not be waited on, or was released by an interrupt.
    #[error("failed to wait for the test run: {source}")]
    WaitTests {
        #[source]
        source: io::Error,
    },
    /// Signal handlers could not be registered.
    #[error("failed to install interrupt handlers: {source}")]
    InstallInterrupts {
        #[source]
        source: io::Error,
    },
}

impl HarnessError {
    /// Classifies the error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingDaemonSource
            | Self::DaemonSourceNotFound { .. }
            | Self::FixtureEntryMissing { .. }
            | Self::TestEntryMissing { .. }
            | Self::WorkingDirectory { .. }
            | Self::Layout(_) => FailureKind::Configuration,
            Self::ProgramNotFound { .. } => FailureKind::DependencyMissing,
            Self::ResetDirectory { .. }
            | Self::CreateHome { .. }
            | Self::HomeNotIsolated { .. }
            | Self::Spawn { .. }
            | Self::MonitorChild { .. }
            | Self::ReadFixtures { .. }
            | Self::FixturesFailed { .. }
            | Self::FixturesMissing { .. }
            | Self::FixtureTimeout { .. }
            | Self::OpenRunDir { .. }
            | Self::ReadPid { .. }
            | Self::DaemonExited { .. }
            | Self::DaemonTimeout { .. }
            | Self::WaitTests { .. }
            | Self::InstallInterrupts { .. } => FailureKind::Setup,
        }
    }
}
