//! Drives one harness run through its stages.
//!
//! Every stage registers what it provisions with the shared [`Resources`]
//! before moving on, so teardown releases exactly what was set up no matter
//! where the run stops.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::ORCHESTRATOR_TARGET;
use super::diagnostics::report_daemon_logs;
use super::error::HarnessError;
use super::plan::HarnessPlan;
use super::provision::{IsolatedHome, reset_directory};
use super::readiness::{
    DaemonReady, FixtureInventory, millis, wait_for_daemon, wait_for_fixtures,
};
use super::resources::{Resources, TeardownReport};
use super::shutdown::{ManagedProcess, wait_with_deadline};
use super::spawning::{
    daemon_command, describe, fixture_command, spawn, stop_command, test_command,
};
use super::types::{Milestone, ProcessRole, RunOutcome, Stage};
use crate::exit::SETUP_FAILURE_EXIT;

/// Runs the stages of a validated [`HarnessPlan`].
#[derive(Debug)]
pub struct Orchestrator {
    plan: HarnessPlan,
    resources: Resources,
    real_config: Option<PathBuf>,
    real_cache: Option<PathBuf>,
    started: Instant,
    timeline: Vec<(Milestone, Instant)>,
}

impl Orchestrator {
    /// Creates an orchestrator whose resources get the plan's termination
    /// grace period.
    pub fn new(plan: HarnessPlan) -> Self {
        let resources = Resources::new(plan.timeouts().termination_grace);
        Self {
            plan,
            resources,
            real_config: dirs::config_dir(),
            real_cache: dirs::cache_dir(),
            started: Instant::now(),
            timeline: Vec::new(),
        }
    }

    /// Overrides the directories the isolated home must not overlap.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_real_dirs(mut self, config: Option<PathBuf>, cache: Option<PathBuf>) -> Self {
        self.real_config = config;
        self.real_cache = cache;
        self
    }

    /// Shared handle for the interrupt handler.
    pub fn resources(&self) -> Resources {
        self.resources.clone()
    }

    /// Milestones reached so far, in order.
    #[cfg(test)]
    pub(crate) fn timeline(&self) -> &[(Milestone, Instant)] {
        &self.timeline
    }

    /// Runs every stage, then tears down whatever was provisioned.
    ///
    /// Teardown runs on success and failure alike; its problems are logged
    /// and never replace the returned result.
    pub fn run(&mut self) -> Result<RunOutcome, HarnessError> {
        let result = self.execute();
        self.teardown().log();
        result
    }

    /// Releases every provisioned resource.
    pub fn teardown(&self) -> TeardownReport {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::Teardown, "stage started");
        self.resources.teardown()
    }

    fn execute(&mut self) -> Result<RunOutcome, HarnessError> {
        info!(
            target: ORCHESTRATOR_TARGET,
            daemon_source = %self.plan.daemon_source().display(),
            mode = %self.plan.launch_mode(),
            "starting harness run"
        );
        self.quiesce();
        self.provision()?;
        let inventory = self.inject_fixtures()?;
        debug!(
            target: ORCHESTRATOR_TARGET,
            devices = inventory.devices,
            "fixtures settled"
        );
        let ready = self.start_daemon()?;
        debug!(target: ORCHESTRATOR_TARGET, pid = ready.pid, "daemon ready");
        let home = self.isolate_home()?;
        self.execute_tests(&home)
    }

    /// Asks a leftover daemon to stop. Failures here never abort the run.
    fn quiesce(&mut self) {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::Quiesce, "stage started");
        let mut command = stop_command(&self.plan);
        let mut child = match spawn(ProcessRole::Quiesce, &mut command) {
            Ok(child) => child,
            Err(error) => {
                warn!(target: ORCHESTRATOR_TARGET, %error, "stop request skipped");
                return;
            }
        };
        match wait_with_deadline(&mut child, self.plan.timeouts().termination_grace) {
            Ok(Some(status)) => {
                debug!(target: ORCHESTRATOR_TARGET, ?status, "stop request finished");
            }
            Ok(None) => {
                warn!(target: ORCHESTRATOR_TARGET, "stop request hung; killing it");
                // Reaping is best effort; a stuck stop request must not block setup.
                if child.kill().is_ok() {
                    let _ = child.wait();
                }
            }
            Err(error) => {
                warn!(target: ORCHESTRATOR_TARGET, %error, "stop request could not be monitored");
            }
        }
    }

    fn provision(&mut self) -> Result<(), HarnessError> {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::Provision, "stage started");
        for dir in self.plan.layout().stable_dirs() {
            // Track before resetting so a half-created directory is still removed.
            self.resources.track_directory(dir.to_path_buf());
            reset_directory(dir)?;
        }
        Ok(())
    }

    fn inject_fixtures(&mut self) -> Result<FixtureInventory, HarnessError> {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::InjectFixtures, "stage started");
        let mut command = fixture_command(&self.plan);
        debug!(target: ORCHESTRATOR_TARGET, command = %describe(&command), "spawning");
        let child = spawn(ProcessRole::Fixture, &mut command)?;
        self.resources.track_process(ManagedProcess {
            role: ProcessRole::Fixture,
            child,
            elevation: None,
        });
        self.mark(Milestone::FixturesLaunched);
        let mut probe = self.resources.probe(ProcessRole::Fixture);
        let inventory = wait_for_fixtures(
            self.plan.layout().test_dir(),
            &mut probe,
            self.plan.timeouts().fixtures,
        )?;
        self.mark(Milestone::FixturesSettled);
        Ok(inventory)
    }

    fn start_daemon(&mut self) -> Result<DaemonReady, HarnessError> {
        info!(
            target: ORCHESTRATOR_TARGET,
            stage = %Stage::StartDaemon,
            mode = %self.plan.launch_mode(),
            "stage started"
        );
        let mut command = daemon_command(&self.plan);
        debug!(target: ORCHESTRATOR_TARGET, command = %describe(&command), "spawning");
        let child = spawn(ProcessRole::Daemon, &mut command)?;
        self.resources.track_process(ManagedProcess {
            role: ProcessRole::Daemon,
            child,
            elevation: self.plan.elevation().map(PathBuf::from),
        });
        self.mark(Milestone::DaemonLaunched);
        let mut probe = self.resources.probe(ProcessRole::Daemon);
        let ready = wait_for_daemon(
            self.plan.layout().run_dir(),
            self.plan.daemon_pid_file(),
            &mut probe,
            self.plan.timeouts().daemon_ready,
        );
        match ready {
            Ok(ready) => {
                self.mark(Milestone::DaemonReady);
                Ok(ready)
            }
            Err(error) => {
                report_daemon_logs(self.plan.layout().log_dir());
                Err(error)
            }
        }
    }

    fn isolate_home(&mut self) -> Result<IsolatedHome, HarnessError> {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::IsolateHome, "stage started");
        let (dir, home) = IsolatedHome::create(self.plan.layout().temp_root())?;
        self.resources.track_home(dir);
        home.ensure_isolated(self.real_config.as_deref(), self.real_cache.as_deref())?;
        Ok(home)
    }

    fn execute_tests(&mut self, home: &IsolatedHome) -> Result<RunOutcome, HarnessError> {
        info!(target: ORCHESTRATOR_TARGET, stage = %Stage::ExecuteTests, "stage started");
        let mut command = test_command(&self.plan, home);
        debug!(target: ORCHESTRATOR_TARGET, command = %describe(&command), "spawning");
        let child = spawn(ProcessRole::TestRun, &mut command)?;
        self.resources.track_process(ManagedProcess {
            role: ProcessRole::TestRun,
            child,
            elevation: None,
        });
        self.mark(Milestone::TestsLaunched);
        let status = self
            .resources
            .wait_for_exit(ProcessRole::TestRun)
            .map_err(|source| HarnessError::WaitTests { source })?;
        self.mark(Milestone::TestsFinished);

        let outcome = RunOutcome::from_status(status);
        if outcome.code() == i32::from(SETUP_FAILURE_EXIT) {
            warn!(
                target: ORCHESTRATOR_TARGET,
                code = outcome.code(),
                "test run exited with the setup-failure sentinel; the two are indistinguishable to callers"
            );
        }
        info!(target: ORCHESTRATOR_TARGET, code = outcome.code(), "test run finished");
        Ok(outcome)
    }

    fn mark(&mut self, milestone: Milestone) {
        let now = Instant::now();
        debug!(
            target: ORCHESTRATOR_TARGET,
            ?milestone,
            elapsed_ms = millis(now.duration_since(self.started)),
            "milestone reached"
        );
        self.timeline.push((milestone, now));
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let report = self.resources.teardown();
        if !report.is_noop() {
            report.log();
        }
    }
}
