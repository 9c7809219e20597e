use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use super::{create_report, log_note, ReportContext};
use crate::error::Result;
use crate::types::ProcessedCommit;

/// Writes a short metadata block per processed commit.
///
/// # Errors
///
/// Returns an error if the output cannot be written.
pub fn write_summary_compilation(
    commits: &[ProcessedCommit],
    ctx: &ReportContext<'_>,
    output_file: &Path,
    include_logs: bool,
) -> Result<bool> {
    info!("Creating summary compilation file...");

    if commits.is_empty() {
        warn!("No commits available to summarize");
        return Ok(false);
    }

    let mut out = create_report(output_file)?;
    ctx.write_header(
        &mut out,
        &format!("# Commit Summary Compilation{}", log_note(include_logs)),
        commits.len(),
    )?;

    let total = commits.len();
    for (idx, commit) in commits.iter().enumerate() {
        let info = &commit.info;
        writeln!(
            out,
            "## Commit {}/{total} - {}: {}",
            idx + 1,
            info.short,
            info.summary_line()
        )?;
        writeln!(out, "- SHA: {}", info.sha)?;
        writeln!(out, "- Author: {}", info.author)?;
        writeln!(out, "- Date: {}", info.date)?;
        writeln!(out, "- URL: {}", info.url)?;
        writeln!(out, "- Body: {}", info.body_line())?;
        writeln!(out, "- Detailed file: {}", commit.report.display())?;
        writeln!(out)?;
    }
    out.flush()?;

    info!("✓ Created summary compilation: {}", output_file.display());
    Ok(true)
}
