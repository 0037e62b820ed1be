//! Precondition checks that turn configuration into a validated run plan.
//!
//! Resolution touches nothing on disk: a plan that fails to resolve leaves
//! no processes and no directories behind.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::Utf8Path;
use chroma_config::{Config, RuntimeLayout};

use super::error::HarnessError;
use super::types::LaunchMode;

/// Environment variable set by CI providers on unattended workers.
pub const UNATTENDED_ENV_VAR: &str = "CI";

/// Read-only view of the invoking process environment.
pub trait Environment {
    /// Returns the value of an environment variable.
    fn var_os(&self, key: &str) -> Option<OsString>;

    /// Returns the working directory.
    fn current_dir(&self) -> io::Result<PathBuf>;
}

/// [`Environment`] backed by the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var_os(&self, key: &str) -> Option<OsString> {
        env::var_os(key)
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        env::current_dir()
    }
}

/// Polling budgets for readiness probes and termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Budget for the fixture inventory to settle.
    pub fixtures: Duration,
    /// Budget for the daemon to write its pid file.
    pub daemon_ready: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub termination_grace: Duration,
}

impl Timeouts {
    fn from_config(config: &Config) -> Self {
        Self {
            fixtures: config.fixture_timeout(),
            daemon_ready: config.daemon_ready_timeout(),
            termination_grace: config.termination_grace(),
        }
    }
}

/// Validated inputs for one harness run.
#[derive(Debug, Clone)]
pub struct HarnessPlan {
    daemon_source: PathBuf,
    fixture_entry: PathBuf,
    launcher: PathBuf,
    elevation: Option<PathBuf>,
    repo_root: PathBuf,
    test_entry: PathBuf,
    import_path_var: String,
    daemon_pid_file: String,
    layout: RuntimeLayout,
    timeouts: Timeouts,
}

impl HarnessPlan {
    /// Daemon source tree.
    pub fn daemon_source(&self) -> &Path {
        &self.daemon_source
    }

    /// Absolute fixture entry point.
    pub fn fixture_entry(&self) -> &Path {
        &self.fixture_entry
    }

    /// Launcher resolved on the search path.
    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    /// Elevation program, present only for unattended launches.
    pub fn elevation(&self) -> Option<&Path> {
        self.elevation.as_deref()
    }

    /// How the daemon will be launched.
    pub fn launch_mode(&self) -> LaunchMode {
        if self.elevation.is_some() {
            LaunchMode::Unattended
        } else {
            LaunchMode::Interactive
        }
    }

    /// Repository root exported to the test run.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Absolute test entry point.
    pub fn test_entry(&self) -> &Path {
        &self.test_entry
    }

    /// Environment variable receiving the repository root.
    pub fn import_path_var(&self) -> &str {
        &self.import_path_var
    }

    /// Full path of the pid file the daemon writes once up.
    pub fn daemon_pid_path(&self) -> PathBuf {
        self.layout.run_dir().join(&self.daemon_pid_file)
    }

    /// Pid file name inside the run directory.
    pub fn daemon_pid_file(&self) -> &str {
        &self.daemon_pid_file
    }

    /// Directories provisioned by the run.
    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    /// Polling budgets.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

/// Validates configuration and the environment, producing a run plan.
///
/// `daemon_source_override` is the positional command-line argument and wins
/// over the configured value.
pub fn resolve_plan(
    config: &Config,
    daemon_source_override: Option<&Utf8Path>,
    environment: &impl Environment,
) -> Result<HarnessPlan, HarnessError> {
    let daemon_source = daemon_source_override
        .or_else(|| config.daemon_source())
        .ok_or(HarnessError::MissingDaemonSource)?
        .as_std_path()
        .to_path_buf();
    if !daemon_source.is_dir() {
        return Err(HarnessError::DaemonSourceNotFound {
            path: daemon_source,
        });
    }
    let fixture_entry = daemon_source.join(config.fixture_entry());
    if !fixture_entry.is_file() {
        return Err(HarnessError::FixtureEntryMissing {
            path: fixture_entry,
        });
    }

    let layout = RuntimeLayout::from_config(config)?;
    let repo_root = match config.repo_root() {
        Some(root) => root.as_std_path().to_path_buf(),
        None => environment
            .current_dir()
            .map_err(|source| HarnessError::WorkingDirectory { source })?,
    };
    let test_entry = repo_root.join(config.test_entry());
    if !test_entry.is_file() {
        return Err(HarnessError::TestEntryMissing { path: test_entry });
    }

    let search_path = environment.var_os("PATH");
    let launcher = require_program(config.launcher(), search_path.as_ref())?;
    let elevation = match detect_launch_mode(config.unattended(), environment) {
        LaunchMode::Unattended => Some(require_program(
            config.elevation_program(),
            search_path.as_ref(),
        )?),
        LaunchMode::Interactive => None,
    };

    Ok(HarnessPlan {
        daemon_source,
        fixture_entry,
        launcher,
        elevation,
        repo_root,
        test_entry,
        import_path_var: config.import_path_var().to_owned(),
        daemon_pid_file: config.daemon_pid_file().to_owned(),
        layout,
        timeouts: Timeouts::from_config(config),
    })
}

/// Chooses the daemon launch mode from the explicit flag or the CI marker.
///
/// Providers set the marker to `true` or `1`; an empty, `0`, or `false`
/// value counts as absent.
pub fn detect_launch_mode(forced: bool, environment: &impl Environment) -> LaunchMode {
    let marker = environment
        .var_os(UNATTENDED_ENV_VAR)
        .map(|value| value.to_string_lossy().trim().to_ascii_lowercase());
    let unattended = match marker.as_deref() {
        None | Some("" | "0" | "false") => forced,
        Some(_) => true,
    };
    if unattended {
        LaunchMode::Unattended
    } else {
        LaunchMode::Interactive
    }
}

fn require_program(program: &str, search_path: Option<&OsString>) -> Result<PathBuf, HarnessError> {
    resolve_program(program, search_path).ok_or_else(|| HarnessError::ProgramNotFound {
        program: program.to_owned(),
    })
}

/// Resolves a program name against a `PATH`-style search list.
///
/// Names containing a path separator are checked directly instead of being
/// searched for.
pub fn resolve_program(program: &str, search_path: Option<&OsString>) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let search_path = search_path?;
    env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
