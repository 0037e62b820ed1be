//! Derives the directory layout provisioned by one harness run.
//!
//! The test-data, run, and log directories are stable names under the
//! temporary root so consecutive runs reset the same locations. The
//! isolated home is created per run from [`HOME_DIR_PREFIX`] and never
//! reused.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// Directory receiving synthetic device descriptors.
pub const TEST_DIR_NAME: &str = "daemon_test";
/// Directory holding the daemon's pid and runtime files.
pub const RUN_DIR_NAME: &str = "daemon_run";
/// Directory receiving the daemon's logs.
pub const LOG_DIR_NAME: &str = "daemon_logs";
/// Prefix for the throwaway home directory of the test run.
pub const HOME_DIR_PREFIX: &str = "chroma-home-";

/// Canonical paths for directories provisioned by the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    temp_root: PathBuf,
    test_dir: PathBuf,
    run_dir: PathBuf,
    log_dir: PathBuf,
}

impl RuntimeLayout {
    /// Derives the layout from the shared configuration.
    ///
    /// Nothing is created on disk; provisioning belongs to the harness.
    pub fn from_config(config: &Config) -> Result<Self, RuntimeLayoutError> {
        let temp_root = config
            .temp_root()
            .map_or_else(env::temp_dir, |root| root.as_std_path().to_path_buf());
        Self::under(temp_root)
    }

    /// Derives the layout beneath an explicit temporary root.
    pub fn under(temp_root: impl Into<PathBuf>) -> Result<Self, RuntimeLayoutError> {
        let temp_root = temp_root.into();
        if !temp_root.is_absolute() {
            return Err(RuntimeLayoutError::RelativeRoot { path: temp_root });
        }
        Ok(Self {
            test_dir: temp_root.join(TEST_DIR_NAME),
            run_dir: temp_root.join(RUN_DIR_NAME),
            log_dir: temp_root.join(LOG_DIR_NAME),
            temp_root,
        })
    }

    /// Parent directory of every provisioned path.
    pub fn temp_root(&self) -> &Path {
        self.temp_root.as_path()
    }

    /// Directory the fixture injector writes and the daemon reads.
    pub fn test_dir(&self) -> &Path {
        self.test_dir.as_path()
    }

    /// Directory holding the daemon's runtime files.
    pub fn run_dir(&self) -> &Path {
        self.run_dir.as_path()
    }

    /// Directory receiving daemon logs.
    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_path()
    }

    /// Stable directories reset at the start of every run, in provisioning
    /// order.
    pub fn stable_dirs(&self) -> [&Path; 3] {
        [self.test_dir(), self.run_dir(), self.log_dir()]
    }
}

/// Errors raised while deriving the runtime layout.
#[derive(Debug, Error)]
pub enum RuntimeLayoutError {
    /// The temporary root must be absolute so child processes with a
    /// different working directory agree on it.
    #[error("temporary root '{path}' must be an absolute path")]
    RelativeRoot {
        /// Offending root.
        path: PathBuf,
    },
}
