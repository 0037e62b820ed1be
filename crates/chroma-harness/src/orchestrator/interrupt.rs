//! Runs teardown when the harness itself is interrupted.
//!
//! A background thread waits for termination signals. On the first one it
//! tears down the shared [`Resources`] and exits with `128 + signal`. The
//! guard returned by [`install`] stops the thread when the run completes
//! normally.

use std::io;
use std::process;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::info;

use super::ORCHESTRATOR_TARGET;
use super::error::HarnessError;
use super::resources::Resources;
use crate::exit::SIGNAL_EXIT_BASE;

/// Signals that trigger teardown.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Keeps the interrupt listener alive for the duration of a run.
#[derive(Debug)]
pub struct InterruptGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

/// Installs the termination handler for `resources`.
pub fn install(resources: Resources) -> Result<InterruptGuard, HarnessError> {
    let mut signals = Signals::new(TERMINATION_SIGNALS)
        .map_err(|source| HarnessError::InstallInterrupts { source })?;
    let handle = signals.handle();
    let thread = thread::Builder::new()
        .name(String::from("chroma-harness-signals"))
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(
                    target: ORCHESTRATOR_TARGET,
                    signal,
                    "interrupted; tearing down"
                );
                resources.teardown().log();
                process::exit(interrupted_exit_code(signal));
            }
        })
        .map_err(|source: io::Error| HarnessError::InstallInterrupts { source })?;
    Ok(InterruptGuard {
        handle,
        thread: Some(thread),
    })
}

/// Exit code for a run interrupted by `signal`.
pub fn interrupted_exit_code(signal: i32) -> i32 {
    SIGNAL_EXIT_BASE + signal
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            info!(target: ORCHESTRATOR_TARGET, "interrupt listener panicked");
        }
    }
}
