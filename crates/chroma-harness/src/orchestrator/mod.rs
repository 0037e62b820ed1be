//! Orchestration of a daemon integration-test run.
//!
//! The run is split into focused submodules:
//! - [`plan`] validates configuration and the environment up front.
//! - [`provision`] resets runtime directories and builds the isolated home.
//! - [`spawning`] constructs the commands for each external process.
//! - [`readiness`] polls for fixtures and daemon readiness.
//! - [`shutdown`] terminates processes with escalation.
//! - [`resources`] owns provisioned state and releases it exactly once.
//! - [`interrupt`] tears down on termination signals.
//! - [`diagnostics`] surfaces daemon logs on a failed start.
//! - [`controller`] sequences the stages.

mod controller;
mod diagnostics;
mod error;
mod interrupt;
mod plan;
#[cfg(test)]
mod plan_tests;
mod provision;
mod readiness;
mod resources;
mod shutdown;
mod spawning;
#[cfg(test)]
pub(crate) mod test_support;
mod types;

/// Tracing target for orchestration events.
pub(crate) const ORCHESTRATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::orchestrator");

pub use controller::Orchestrator;
pub use error::{FailureKind, HarnessError};
pub use interrupt::{InterruptGuard, TERMINATION_SIGNALS, install as install_interrupts};
pub use plan::{
    Environment, HarnessPlan, ProcessEnvironment, Timeouts, UNATTENDED_ENV_VAR,
    detect_launch_mode, resolve_plan, resolve_program,
};
pub use provision::{CACHE_SUBDIR, CONFIG_SUBDIR, IsolatedHome};
pub use readiness::{DaemonReady, FixtureInventory};
pub use resources::{Resources, StoppedProcess, TeardownReport, TeardownWarning};
pub use shutdown::Termination;
pub use types::{LaunchMode, ProcessRole, RunOutcome, Stage};
