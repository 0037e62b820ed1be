//! Filesystem provisioning for a run: stable directories and the isolated
//! home of the test run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chroma_config::HOME_DIR_PREFIX;
use tempfile::{Builder, TempDir};

use super::error::HarnessError;

/// Configuration directory name inside the isolated home.
pub const CONFIG_SUBDIR: &str = ".config";
/// Cache directory name inside the isolated home.
pub const CACHE_SUBDIR: &str = ".cache";

/// Removes whatever occupies `path` and recreates it empty.
///
/// Resetting rather than reusing keeps fixtures and logs from a previous run
/// out of this one.
pub(super) fn reset_directory(path: &Path) -> Result<(), HarnessError> {
    let reset_error = |source| HarnessError::ResetDirectory {
        path: path.to_path_buf(),
        source,
    };
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path).map_err(reset_error)?,
        Ok(_) => fs::remove_file(path).map_err(reset_error)?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(reset_error(source)),
    }
    fs::create_dir_all(path).map_err(reset_error)
}

/// Paths handed to the test run as its home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedHome {
    root: PathBuf,
    config_dir: PathBuf,
    cache_dir: PathBuf,
}

impl IsolatedHome {
    /// Creates a uniquely named home under `parent` with its configuration
    /// and cache directories.
    ///
    /// The returned [`TempDir`] owns the directory; dropping or closing it
    /// removes the whole tree.
    pub(super) fn create(parent: &Path) -> Result<(TempDir, Self), HarnessError> {
        let create_error = |source| HarnessError::CreateHome {
            path: parent.to_path_buf(),
            source,
        };
        let dir = Builder::new()
            .prefix(HOME_DIR_PREFIX)
            .tempdir_in(parent)
            .map_err(create_error)?;
        let root = dir.path().to_path_buf();
        let home = Self {
            config_dir: root.join(CONFIG_SUBDIR),
            cache_dir: root.join(CACHE_SUBDIR),
            root,
        };
        for subdir in [&home.config_dir, &home.cache_dir] {
            fs::create_dir_all(subdir).map_err(create_error)?;
        }
        Ok((dir, home))
    }

    /// Rejects a home whose directories coincide with the invoking user's
    /// real configuration or cache directories.
    pub(super) fn ensure_isolated(
        &self,
        real_config: Option<&Path>,
        real_cache: Option<&Path>,
    ) -> Result<(), HarnessError> {
        let checks = [
            ("configuration", &self.config_dir, real_config),
            ("cache", &self.cache_dir, real_cache),
        ];
        for (kind, isolated, real) in checks {
            let Some(real) = real else {
                continue;
            };
            if isolated.starts_with(real) || real.starts_with(isolated) {
                return Err(HarnessError::HomeNotIsolated {
                    path: isolated.clone(),
                    real: real.to_path_buf(),
                    kind,
                });
            }
        }
        Ok(())
    }

    /// Home directory of the test run.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configuration directory of the test run.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Cache directory of the test run.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
