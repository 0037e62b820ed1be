//! Error types for the harness runtime.

use std::sync::Arc;

use thiserror::Error;

use crate::orchestrator::{FailureKind, HarnessError};
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Harness(#[from] HarnessError),
}

impl AppError {
    /// Failure class reported alongside the sentinel exit code.
    pub(crate) fn kind(&self) -> FailureKind {
        match self {
            Self::LoadConfiguration(_) | Self::CliUsage(_) | Self::Telemetry(_) => {
                FailureKind::Configuration
            }
            Self::Harness(error) => error.kind(),
        }
    }
}
