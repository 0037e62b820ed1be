//! Fake source trees and environments for orchestrator unit tests.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use chroma_config::{Config, DEFAULT_FIXTURE_ENTRY, DEFAULT_TEST_ENTRY};
use tempfile::TempDir;

use super::plan::Environment;

/// Writes an executable shell script to `path`, creating parent directories.
pub(crate) fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("script parent");
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut permissions = fs::metadata(path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("chmod script");
}

/// Daemon source, repository, program directory, and temp root laid out
/// under one temporary directory.
pub(crate) struct SourceTree {
    root: TempDir,
}

impl SourceTree {
    /// Builds a tree whose entry points and programs all exist.
    pub(crate) fn complete() -> Self {
        let tree = Self::empty();
        write_script(&tree.daemon_source().join(DEFAULT_FIXTURE_ENTRY), "exit 0");
        write_script(&tree.repo_root().join(DEFAULT_TEST_ENTRY), "exit 0");
        write_script(&tree.bin_dir().join("openrazer-daemon"), "exit 0");
        write_script(&tree.bin_dir().join("sudo"), "exec \"$@\"");
        tree
    }

    /// Builds a tree whose programs behave like real ones: the injector
    /// writes devices and the launcher records its pid and stays up.
    pub(crate) fn working() -> Self {
        let tree = Self::complete();
        write_script(
            &tree.daemon_source().join(DEFAULT_FIXTURE_ENTRY),
            r#"while [ $# -gt 0 ]; do
  case "$1" in --dest) mkdir -p "$2/0003:1532:0203.0001"; shift ;; esac
  shift
done"#,
        );
        write_script(
            &tree.bin_dir().join("openrazer-daemon"),
            r#"case "$1" in --stop) exit 0 ;; esac
while [ $# -gt 0 ]; do
  case "$1" in --run-dir) run_dir="$2"; shift ;; esac
  shift
done
trap 'exit 0' TERM
echo $$ > "$run_dir/openrazer-daemon.pid"
while true; do sleep 0.1; done"#,
        );
        tree
    }

    /// Builds the directories without any entry point or program.
    pub(crate) fn empty() -> Self {
        let tree = Self {
            root: TempDir::new().expect("tree root"),
        };
        for dir in [
            tree.daemon_source(),
            tree.repo_root(),
            tree.bin_dir(),
            tree.temp_root(),
        ] {
            fs::create_dir_all(dir).expect("tree directory");
        }
        tree
    }

    pub(crate) fn daemon_source(&self) -> PathBuf {
        self.root.path().join("openrazer")
    }

    pub(crate) fn repo_root(&self) -> PathBuf {
        self.root.path().join("repo")
    }

    pub(crate) fn bin_dir(&self) -> PathBuf {
        self.root.path().join("bin")
    }

    pub(crate) fn temp_root(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    /// Configuration pointing every path at this tree.
    pub(crate) fn config(&self) -> Config {
        Config {
            daemon_source: Some(utf8(self.daemon_source())),
            repo_root: Some(utf8(self.repo_root())),
            temp_root: Some(utf8(self.temp_root())),
            ..Config::default()
        }
    }

    /// Environment whose search path holds only this tree's programs.
    pub(crate) fn environment(&self) -> FakeEnvironment {
        FakeEnvironment::new(self.repo_root()).with_var("PATH", self.bin_dir())
    }
}

pub(crate) fn utf8(path: PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).expect("utf-8 test path")
}

/// In-memory [`Environment`].
#[derive(Debug, Clone)]
pub(crate) struct FakeEnvironment {
    vars: HashMap<String, OsString>,
    cwd: PathBuf,
}

impl FakeEnvironment {
    pub(crate) fn new(cwd: PathBuf) -> Self {
        Self {
            vars: HashMap::new(),
            cwd,
        }
    }

    pub(crate) fn with_var(mut self, key: &str, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.to_owned(), value.into());
        self
    }
}

impl Environment for FakeEnvironment {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.vars.get(key).cloned()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}
