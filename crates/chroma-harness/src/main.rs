//! Binary entry point for the daemon test harness.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Streams stay unlocked: interrupt teardown logs to stderr from another
    // thread while the run is in progress.
    chroma_harness::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
