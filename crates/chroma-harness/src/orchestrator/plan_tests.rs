//! Unit tests for precondition checks and launch-mode detection.

use std::ffi::OsString;
use std::fs;

use rstest::{fixture, rstest};

use super::error::{FailureKind, HarnessError};
use super::plan::*;
use super::test_support::{FakeEnvironment, SourceTree, utf8, write_script};
use super::types::LaunchMode;

#[fixture]
fn tree() -> SourceTree {
    SourceTree::complete()
}

#[rstest]
fn resolves_a_complete_tree(tree: SourceTree) {
    let plan = resolve_plan(&tree.config(), None, &tree.environment()).expect("plan");

    assert_eq!(plan.daemon_source(), tree.daemon_source());
    assert_eq!(plan.launcher(), tree.bin_dir().join("openrazer-daemon"));
    assert_eq!(plan.launch_mode(), LaunchMode::Interactive);
    assert!(plan.elevation().is_none());
    assert_eq!(plan.layout().temp_root(), tree.temp_root());
    assert_eq!(
        plan.daemon_pid_path(),
        plan.layout().run_dir().join("openrazer-daemon.pid")
    );
}

#[rstest]
fn missing_daemon_source_is_a_configuration_failure(tree: SourceTree) {
    let config = chroma_config::Config {
        daemon_source: None,
        ..tree.config()
    };

    let error = resolve_plan(&config, None, &tree.environment()).expect_err("must fail");

    assert!(matches!(error, HarnessError::MissingDaemonSource));
    assert_eq!(error.kind(), FailureKind::Configuration);
}

#[rstest]
fn positional_source_overrides_configuration(tree: SourceTree) {
    let config = chroma_config::Config {
        daemon_source: Some(utf8(tree.repo_root().join("elsewhere"))),
        ..tree.config()
    };
    let positional = utf8(tree.daemon_source());

    let plan =
        resolve_plan(&config, Some(&positional), &tree.environment()).expect("override wins");

    assert_eq!(plan.daemon_source(), tree.daemon_source());
}

#[rstest]
fn nonexistent_source_is_rejected(tree: SourceTree) {
    let missing = utf8(tree.daemon_source().join("missing"));

    let error = resolve_plan(&tree.config(), Some(&missing), &tree.environment())
        .expect_err("must fail");

    assert!(matches!(error, HarnessError::DaemonSourceNotFound { .. }));
}

#[test]
fn source_without_fixture_entry_is_rejected() {
    let tree = SourceTree::empty();

    let error =
        resolve_plan(&tree.config(), None, &tree.environment()).expect_err("must fail");

    assert!(matches!(error, HarnessError::FixtureEntryMissing { .. }));
    assert_eq!(error.kind(), FailureKind::Configuration);
}

#[rstest]
fn missing_test_entry_is_rejected(tree: SourceTree) {
    fs::remove_file(tree.repo_root().join(chroma_config::DEFAULT_TEST_ENTRY))
        .expect("remove test entry");

    let error = resolve_plan(&tree.config(), None, &tree.environment()).expect_err("must fail");

    assert!(matches!(error, HarnessError::TestEntryMissing { .. }));
}

#[rstest]
fn missing_launcher_is_a_dependency_failure(tree: SourceTree) {
    fs::remove_file(tree.bin_dir().join("openrazer-daemon")).expect("remove launcher");

    let error = resolve_plan(&tree.config(), None, &tree.environment()).expect_err("must fail");

    assert_eq!(error.kind(), FailureKind::DependencyMissing);
    assert!(error.to_string().contains("openrazer-daemon"));
}

#[rstest]
fn non_executable_launcher_is_not_found(tree: SourceTree) {
    let launcher = tree.bin_dir().join("openrazer-daemon");
    fs::write(&launcher, "not a program").expect("overwrite");
    let mut permissions = fs::metadata(&launcher).expect("metadata").permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut permissions, 0o644);
    fs::set_permissions(&launcher, permissions).expect("chmod");

    let error = resolve_plan(&tree.config(), None, &tree.environment()).expect_err("must fail");

    assert!(matches!(error, HarnessError::ProgramNotFound { .. }));
}

#[rstest]
fn unattended_runs_require_the_elevation_program(tree: SourceTree) {
    fs::remove_file(tree.bin_dir().join("sudo")).expect("remove sudo");
    let environment = tree.environment().with_var(UNATTENDED_ENV_VAR, "true");

    let error = resolve_plan(&tree.config(), None, &environment).expect_err("must fail");

    match error {
        HarnessError::ProgramNotFound { program } => assert_eq!(program, "sudo"),
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn unattended_runs_resolve_the_elevation_program(tree: SourceTree) {
    let config = chroma_config::Config {
        unattended: true,
        ..tree.config()
    };

    let plan = resolve_plan(&config, None, &tree.environment()).expect("plan");

    assert_eq!(plan.launch_mode(), LaunchMode::Unattended);
    assert_eq!(plan.elevation(), Some(tree.bin_dir().join("sudo").as_path()));
}

#[rstest]
fn repo_root_defaults_to_working_directory(tree: SourceTree) {
    let config = chroma_config::Config {
        repo_root: None,
        ..tree.config()
    };

    let plan = resolve_plan(&config, None, &tree.environment()).expect("plan");

    assert_eq!(plan.repo_root(), tree.repo_root());
}

#[rstest]
fn relative_temp_root_is_rejected(tree: SourceTree) {
    let config = chroma_config::Config {
        temp_root: Some(camino::Utf8PathBuf::from("relative/tmp")),
        ..tree.config()
    };

    let error = resolve_plan(&config, None, &tree.environment()).expect_err("must fail");

    assert!(matches!(error, HarnessError::Layout(_)));
}

#[rstest]
#[case(None, false, LaunchMode::Interactive)]
#[case(None, true, LaunchMode::Unattended)]
#[case(Some("true"), false, LaunchMode::Unattended)]
#[case(Some("1"), false, LaunchMode::Unattended)]
#[case(Some("TRUE"), false, LaunchMode::Unattended)]
#[case(Some(""), false, LaunchMode::Interactive)]
#[case(Some("0"), false, LaunchMode::Interactive)]
#[case(Some("false"), false, LaunchMode::Interactive)]
#[case(Some("false"), true, LaunchMode::Unattended)]
fn launch_mode_follows_marker_and_flag(
    #[case] marker: Option<&str>,
    #[case] forced: bool,
    #[case] expected: LaunchMode,
) {
    let mut environment = FakeEnvironment::new("/".into());
    if let Some(value) = marker {
        environment = environment.with_var(UNATTENDED_ENV_VAR, value);
    }

    assert_eq!(detect_launch_mode(forced, &environment), expected);
}

#[test]
fn program_paths_bypass_the_search_path() {
    let tree = SourceTree::empty();
    let program = tree.bin_dir().join("custom-launcher");
    write_script(&program, "exit 0");
    let program = program.to_string_lossy().into_owned();

    assert!(resolve_program(&program, None).is_some());
    assert!(resolve_program("custom-launcher", None).is_none());
}

#[test]
fn search_path_is_scanned_in_order() {
    let first = SourceTree::empty();
    let second = SourceTree::empty();
    write_script(&first.bin_dir().join("tool"), "exit 0");
    write_script(&second.bin_dir().join("tool"), "exit 0");
    let search_path = std::env::join_paths([first.bin_dir(), second.bin_dir()])
        .expect("join paths");

    let found = resolve_program("tool", Some(&OsString::from(search_path)));

    assert_eq!(found, Some(first.bin_dir().join("tool")));
}
