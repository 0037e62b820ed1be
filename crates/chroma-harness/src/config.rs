//! Configuration loading helpers for the harness CLI.
//!
//! Configuration flags may appear anywhere on the command line. They are
//! routed to `ortho_config` while every other token goes to the harness CLI
//! parser. A `--` terminator ends flag routing.

use std::ffi::{OsStr, OsString};

use chroma_config::{CONFIG_CLI_FLAGS, CONFIG_CLI_SWITCHES, Config};
use ortho_config::OrthoConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the routed configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Loader backed by every `ortho_config` layer.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let mut parts = text.splitn(2, '=');
    let Some(flag) = parts.next() else {
        return FlagAction::Skip;
    };
    let has_inline_value = parts.next().is_some();
    if !CONFIG_CLI_FLAGS.contains(&flag) {
        return FlagAction::Skip;
    }
    FlagAction::Include {
        needs_value: !has_inline_value && !CONFIG_CLI_SWITCHES.contains(&flag),
    }
}

/// Arguments routed to the configuration loader and to the CLI parser.
///
/// Both lists start with the program name.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) cli_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut split = ConfigArgumentSplit::default();
    let mut remaining = args.iter();
    let Some(program) = remaining.next() else {
        return split;
    };
    split.config_arguments.push(program.clone());
    split.cli_arguments.push(program.clone());

    while let Some(argument) = remaining.next() {
        if argument == "--" {
            split.cli_arguments.push(argument.clone());
            split.cli_arguments.extend(remaining.by_ref().cloned());
            break;
        }
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                split.config_arguments.push(argument.clone());
                if needs_value && let Some(value) = remaining.next() {
                    split.config_arguments.push(value.clone());
                }
            }
            FlagAction::Skip => split.cli_arguments.push(argument.clone()),
        }
    }
    split
}
