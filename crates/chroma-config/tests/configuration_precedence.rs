use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use camino::Utf8Path;
use chroma_config::{
    Config, DEFAULT_DAEMON_READY_TIMEOUT, DEFAULT_FIXTURE_TIMEOUT, DEFAULT_LAUNCHER,
    default_log_format,
};
use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const ENV_KEYS: &[&str] = &[
    "CHROMA_HARNESS_LAUNCHER",
    "CHROMA_HARNESS_DAEMON_SOURCE",
    "CHROMA_HARNESS_CONFIG_PATH",
];

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_lock: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_lock = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        let harness = Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("chroma-harness")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_lock: env_lock,
        };
        // Stray values from the invoking shell would shadow the layers under
        // test.
        for key in ENV_KEYS {
            harness.remove_env(key);
        }
        harness
    }

    fn write_config(&self, launcher: &str) {
        let path = self.temp_dir.path().join("chroma-harness.toml");
        if let Err(error) = fs::write(&path, format!("launcher = \"{launcher}\"\n")) {
            panic!("failed to write configuration: {error}");
        }
        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Edition 2024 marks environment mutation as `unsafe`; the process-wide
        // lock above serialises every scenario touching these keys and `Drop`
        // restores the previous values.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn remove_env(&self, key: &str) {
        let previous = std::env::var_os(key);
        if previous.is_none() {
            return;
        }
        unsafe { std::env::remove_var(key) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }
        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the launcher to \"{launcher}\"")]
fn given_configuration_file(harness: &Harness, launcher: String) {
    harness.write_config(&launcher);
}

#[given("the environment overrides the launcher to \"{launcher}\"")]
fn given_environment_launcher(harness: &Harness, launcher: String) {
    harness.set_env("CHROMA_HARNESS_LAUNCHER", &launcher);
}

#[given("the environment sets the daemon source to \"{path}\"")]
fn given_environment_source(harness: &Harness, path: String) {
    harness.set_env("CHROMA_HARNESS_DAEMON_SOURCE", &path);
}

#[when("the CLI sets the launcher to \"{launcher}\"")]
fn when_cli_launcher(harness: &Harness, launcher: String) {
    harness.push_cli_arg("--launcher");
    harness.push_cli_arg(OsString::from(&launcher));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the launcher to \"{launcher}\"")]
fn then_resolved_launcher(harness: &Harness, launcher: String) {
    assert_eq!(harness.config().launcher(), launcher);
}

#[then("loading the configuration resolves the daemon source to \"{path}\"")]
fn then_resolved_source(harness: &Harness, path: String) {
    assert_eq!(harness.config().daemon_source(), Some(Utf8Path::new(&path)));
}

#[then("the launcher and timeouts use their defaults")]
fn then_defaults(harness: &Harness) {
    let config = harness.config();
    assert_eq!(config.launcher(), DEFAULT_LAUNCHER);
    assert_eq!(config.fixture_timeout(), DEFAULT_FIXTURE_TIMEOUT);
    assert_eq!(config.daemon_ready_timeout(), DEFAULT_DAEMON_READY_TIMEOUT);
    assert_eq!(config.log_format(), default_log_format());
    assert!(!config.unattended());
}

#[scenario(path = "tests/features/configuration_precedence.feature")]
fn configuration_precedence(#[from(harness)] harness: Harness) {
    let _ = harness;
}
