//! Vocabulary shared by the orchestrator stages.

use std::fmt;
use std::process::{ExitCode, ExitStatus};

use crate::exit::{exit_code_from_status, status_code};

/// Ordered stages of one harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Validating the daemon source and external programs.
    Preconditions,
    /// Asking any prior daemon instance to stop.
    Quiesce,
    /// Resetting the stable runtime directories.
    Provision,
    /// Populating the synthetic device inventory.
    InjectFixtures,
    /// Launching the daemon and waiting for readiness.
    StartDaemon,
    /// Creating the throwaway home for the test run.
    IsolateHome,
    /// Running the test suite in the foreground.
    ExecuteTests,
    /// Releasing every provisioned resource.
    Teardown,
}

impl fmt::Display for Stage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Preconditions => "preconditions",
            Self::Quiesce => "quiesce",
            Self::Provision => "provision",
            Self::InjectFixtures => "inject-fixtures",
            Self::StartDaemon => "start-daemon",
            Self::IsolateHome => "isolate-home",
            Self::ExecuteTests => "execute-tests",
            Self::Teardown => "teardown",
        })
    }
}

/// Points in a run recorded on the orchestrator timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Milestone {
    /// The fixture injector process was spawned.
    FixturesLaunched,
    /// The fixture inventory settled on disk.
    FixturesSettled,
    /// The daemon launcher process was spawned.
    DaemonLaunched,
    /// The daemon wrote its pid file.
    DaemonReady,
    /// The test-run process was spawned.
    TestsLaunched,
    /// The test-run process exited.
    TestsFinished,
}

/// Processes started by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The daemon stop request issued while quiescing.
    Quiesce,
    /// The fixture injector.
    Fixture,
    /// The daemon under test.
    Daemon,
    /// The foreground test run.
    TestRun,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Quiesce => "daemon stop request",
            Self::Fixture => "fixture injector",
            Self::Daemon => "daemon",
            Self::TestRun => "test run",
        })
    }
}

/// How the daemon is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Started as the invoking user.
    Interactive,
    /// Started through the elevation program because unattended workers
    /// lack the device group membership.
    Unattended,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Interactive => "interactive",
            Self::Unattended => "unattended",
        })
    }
}

/// Result of a run whose test stage completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The test run exited zero.
    Passed,
    /// The test run exited with a non-zero code (or was killed by a signal,
    /// reported as `128 + signal`).
    TestFailed {
        /// Code propagated as the harness exit code.
        code: i32,
    },
}

impl RunOutcome {
    /// Classifies the test-run exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        match status_code(status) {
            0 => Self::Passed,
            code => Self::TestFailed { code },
        }
    }

    /// Raw code reported by the test run.
    pub fn code(self) -> i32 {
        match self {
            Self::Passed => 0,
            Self::TestFailed { code } => code,
        }
    }

    /// Exit code the harness reports for this outcome.
    pub fn exit_code(self) -> ExitCode {
        exit_code_from_status(self.code())
    }
}
