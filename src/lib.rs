pub use error::{Error, Result};
pub use processor::{AggregateReports, BatchOptions, BatchProcessor, RunSummary};
pub use selection::{Selection, SelectionError};
pub use types::{checks_all_green, CheckKind, CheckResult, CommitInfo, ProcessedCommit};

use std::path::Path;

mod error;
pub mod git;
pub mod host;
pub mod processor;
pub mod report;
pub mod selection;
pub mod snapshot;
#[cfg(test)]
mod testing;
mod types;

/// Creates a `BatchProcessor` for a local repository, using the `git` and `gh`
/// command line tools.
///
/// # Arguments
///
/// * `repo_path`: The path to the local Git repository.
/// * `options`: Base branch, remote, output directory and cleanup behaviour.
#[must_use]
pub fn new(repo_path: &Path, options: BatchOptions) -> BatchProcessor<git::GitCli, host::GhCli> {
    BatchProcessor::new_from_local(repo_path, options)
}
