//! Test world for behavioural harness runs.
//!
//! Every external program is a shell script in a temporary tree. The
//! scripts append to a shared order log so steps can assert sequencing.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chroma_config::{Config, DEFAULT_FIXTURE_ENTRY, DEFAULT_TEST_ENTRY};
use rstest::fixture;

use crate::orchestrator::test_support::{SourceTree, write_script};
use crate::{AppError, ConfigLoader, run_with};

/// A config loader that returns a fixed configuration.
pub(super) struct StaticConfigLoader {
    config: Config,
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// State shared by the steps of one scenario.
pub(super) struct HarnessWorld {
    pub tree: SourceTree,
    pub config: Config,
    pub exit_code: Option<ExitCode>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl HarnessWorld {
    fn new() -> Self {
        let tree = SourceTree::complete();
        let config = Config {
            fixture_timeout_ms: 5_000,
            daemon_ready_timeout_ms: 5_000,
            termination_grace_ms: 1_000,
            log_filter: String::from("warn"),
            ..tree.config()
        };
        let world = Self {
            tree,
            config,
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        world.install_fixture_injector();
        world.install_daemon();
        world.install_test_suite(0);
        world
    }

    fn records(&self) -> PathBuf {
        self.tree.repo_root().join("records")
    }

    pub fn order_log(&self) -> PathBuf {
        self.records().join("order.log")
    }

    pub fn home_record(&self) -> PathBuf {
        self.records().join("home")
    }

    pub fn import_path_record(&self) -> PathBuf {
        self.records().join("import_path")
    }

    pub fn daemon_pid_record(&self) -> PathBuf {
        self.records().join("daemon.pid")
    }

    fn install_fixture_injector(&self) {
        write_script(
            &self.tree.daemon_source().join(DEFAULT_FIXTURE_ENTRY),
            &format!(
                r#"dest=""
while [ $# -gt 0 ]; do
  case "$1" in --dest) dest="$2"; shift ;; esac
  shift
done
mkdir -p "$dest/0003:1532:0203.0001" "$dest/0003:1532:0084.0002"
echo fixtures >> '{log}'"#,
                log = self.order_log().display()
            ),
        );
    }

    fn install_daemon(&self) {
        fs::create_dir_all(self.records()).expect("records directory");
        write_script(
            &self.tree.bin_dir().join("openrazer-daemon"),
            &format!(
                r#"case "$1" in --stop) echo stop >> '{log}'; exit 0 ;; esac
run_dir=""
while [ $# -gt 0 ]; do
  case "$1" in --run-dir) run_dir="$2"; shift ;; esac
  shift
done
echo daemon >> '{log}'
echo $$ > '{pid}'
trap 'exit 0' TERM
echo $$ > "$run_dir/openrazer-daemon.pid"
while true; do sleep 0.1; done"#,
                log = self.order_log().display(),
                pid = self.daemon_pid_record().display(),
            ),
        );
    }

    pub fn install_crashing_daemon(&self) {
        write_script(
            &self.tree.bin_dir().join("openrazer-daemon"),
            &format!(
                r#"case "$1" in --stop) echo stop >> '{log}'; exit 0 ;; esac
log_dir=""
while [ $# -gt 0 ]; do
  case "$1" in --log-dir) log_dir="$2"; shift ;; esac
  shift
done
echo daemon >> '{log}'
echo "no devices bound" >> "$log_dir/razer.log"
exit 1"#,
                log = self.order_log().display()
            ),
        );
    }

    pub fn install_test_suite(&self, code: i32) {
        write_script(
            &self.tree.repo_root().join(DEFAULT_TEST_ENTRY),
            &format!(
                r#"echo tests >> '{log}'
echo "$HOME" > '{home}'
echo "$PYTHONPATH" > '{import_path}'
exit {code}"#,
                log = self.order_log().display(),
                home = self.home_record().display(),
                import_path = self.import_path_record().display(),
            ),
        );
    }

    pub fn run(&mut self) {
        self.stdout.clear();
        self.stderr.clear();
        let loader = StaticConfigLoader {
            config: self.config.clone(),
        };
        let environment = self.tree.environment();
        let exit = run_with(
            [OsString::from("chroma-harness")],
            &mut self.stdout,
            &mut self.stderr,
            &loader,
            &environment,
        );
        self.exit_code = Some(exit);
    }

    /// Runtime directories still present under the temp root.
    pub fn leftover_directories(&self) -> Result<Vec<PathBuf>> {
        let root = self.tree.temp_root();
        let entries = fs::read_dir(&root)
            .with_context(|| format!("failed to list {}", root.display()))?;
        let mut leftovers = Vec::new();
        for entry in entries {
            leftovers.push(entry?.path());
        }
        Ok(leftovers)
    }

    pub fn order(&self) -> Vec<String> {
        fs::read_to_string(self.order_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    pub fn read_record(&self, path: &Path) -> Result<String> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("missing record {}", path.display()))?;
        Ok(content.trim().to_owned())
    }
}

#[fixture]
pub(super) fn world() -> RefCell<HarnessWorld> {
    RefCell::new(HarnessWorld::new())
}
