//! Surfaces daemon logs when the daemon fails to come up.
//!
//! Teardown deletes the log directory, so anything worth seeing has to be
//! logged before it goes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::error;

use super::ORCHESTRATOR_TARGET;

/// Trailing lines kept from each log file.
const LOG_TAIL_LINES: usize = 20;

/// Trailing lines of one daemon log file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogExcerpt {
    /// Log file the lines came from.
    path: PathBuf,
    /// Last lines of the file, oldest first.
    lines: Vec<String>,
}

/// Collects the tail of every regular file in `log_dir`, sorted by path.
///
/// Unreadable entries are skipped: diagnostics must never mask the failure
/// being diagnosed.
fn collect_log_tails(log_dir: &Path, max_lines: usize) -> Vec<LogExcerpt> {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    paths
        .into_iter()
        .filter_map(|path| {
            let bytes = fs::read(&path).ok()?;
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            let start = lines.len().saturating_sub(max_lines);
            let tail = lines
                .get(start..)
                .unwrap_or_default()
                .iter()
                .map(|line| (*line).to_owned())
                .collect();
            Some(LogExcerpt { path, lines: tail })
        })
        .collect()
}

/// Logs the tail of every daemon log at error level.
pub(super) fn report_daemon_logs(log_dir: &Path) {
    for excerpt in collect_log_tails(log_dir, LOG_TAIL_LINES) {
        for line in &excerpt.lines {
            error!(
                target: ORCHESTRATOR_TARGET,
                file = %excerpt.path.display(),
                "{line}"
            );
        }
    }
}
