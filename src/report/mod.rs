use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::selection::Selection;

mod commit;
mod master;
mod round_robin;
mod summary;
mod touched;

pub use commit::write_commit_report;
pub use master::write_master_comparison;
pub use round_robin::write_round_robin_comparisons;
pub use summary::write_summary_compilation;
pub use touched::write_touched_files_compilation;

/// File names never included in reports.
const EXCLUDED_FILE_NAMES: [&str; 1] = ["package-lock.json"];

const RULE_WIDTH: usize = 80;

pub(crate) const NO_DIFFERENCES: &str = "# No differences found\n";

/// Everything aggregate reports share: the selection they describe and when they were generated.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub selection: &'a Selection,
    pub generated: String,
}

impl<'a> ReportContext<'a> {
    /// Context stamped with the current local time.
    #[must_use]
    pub fn new(selection: &'a Selection) -> Self {
        Self::with_timestamp(
            selection,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    }

    #[must_use]
    pub const fn with_timestamp(selection: &'a Selection, generated: String) -> Self {
        Self {
            selection,
            generated,
        }
    }

    fn write_selection_header(&self, out: &mut impl Write) -> Result<()> {
        for line in self.selection.header_lines() {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// Title, selection provenance, commit count and timestamp, closed by a rule.
    fn write_header(&self, out: &mut impl Write, title: &str, total: usize) -> Result<()> {
        writeln!(out, "{title}")?;
        self.write_selection_header(out)?;
        writeln!(out, "# Total commits: {total}")?;
        writeln!(out, "# Generated: {}", self.generated)?;
        writeln!(out, "{}\n", rule('='))?;
        Ok(())
    }
}

pub(crate) fn rule(ch: char) -> String {
    std::iter::repeat(ch).take(RULE_WIDTH).collect()
}

pub(crate) const fn log_note(include_logs: bool) -> &'static str {
    if include_logs {
        " (with logs)"
    } else {
        ""
    }
}

/// Opens a report for writing, creating its parent directory when needed.
pub(crate) fn create_report(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            debug!(parent_dir = %parent_dir.display(), "Creating parent directory");
            fs::create_dir_all(parent_dir)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Splits files into those kept in reports and those excluded by name.
#[must_use]
pub fn filter_excluded_files(files: &[String]) -> (Vec<String>, Vec<String>) {
    let (excluded, included): (Vec<String>, Vec<String>) = files.iter().cloned().partition(|f| {
        Path::new(f)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| EXCLUDED_FILE_NAMES.contains(&name))
    });

    if !excluded.is_empty() {
        info!(
            excluded = %excluded.join(", "),
            "Skipping {} excluded file(s)",
            excluded.len()
        );
    }
    (included, excluded)
}

const fn logs_suffix(include_logs: bool) -> &'static str {
    if include_logs {
        "-with-logs"
    } else {
        ""
    }
}

/// `commit-<short>-implementation[-with-logs].txt`
#[must_use]
pub fn commit_report_path(output_dir: &Path, short: &str, include_logs: bool) -> PathBuf {
    output_dir.join(format!(
        "commit-{short}-implementation{}.txt",
        logs_suffix(include_logs)
    ))
}

/// `commit-<kind>-<tag>[-with-logs].txt`
#[must_use]
pub fn aggregate_report_path(
    output_dir: &Path,
    kind: &str,
    tag: &str,
    include_logs: bool,
) -> PathBuf {
    output_dir.join(format!("commit-{kind}-{tag}{}.txt", logs_suffix(include_logs)))
}

/// `commit-<left>-versus-<right>.txt`
#[must_use]
pub fn round_robin_path(output_dir: &Path, left: &str, right: &str) -> PathBuf {
    let short = |sha: &str| sha.get(..8).unwrap_or(sha).to_string();
    output_dir.join(format!(
        "commit-{}-versus-{}.txt",
        short(left),
        short(right)
    ))
}
