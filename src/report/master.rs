use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use super::{create_report, log_note, rule, ReportContext};
use crate::error::Result;
use crate::types::ProcessedCommit;

/// Concatenates the per-commit reports into one comparison file.
///
/// # Errors
///
/// Returns an error if a per-commit report cannot be read or the output cannot be written.
pub fn write_master_comparison(
    commits: &[ProcessedCommit],
    ctx: &ReportContext<'_>,
    output_file: &Path,
    include_logs: bool,
) -> Result<bool> {
    info!("Creating master comparison file...");

    if commits.is_empty() {
        warn!("No individual commit files found for master comparison");
        return Ok(false);
    }

    let mut out = create_report(output_file)?;
    ctx.write_header(
        &mut out,
        &format!("# Master Comparison{}", log_note(include_logs)),
        commits.len(),
    )?;

    let total = commits.len();
    for (idx, commit) in commits.iter().enumerate() {
        writeln!(out, "\n{}", rule('='))?;
        writeln!(
            out,
            "# Commit {}/{total} - {}: {}",
            idx + 1,
            commit.info.short,
            commit.info.subject
        )?;
        writeln!(out, "{}\n", rule('='))?;
        out.write_all(fs::read_to_string(&commit.report)?.as_bytes())?;
        write!(out, "\n\n")?;
    }
    out.flush()?;

    info!("✓ Created master comparison: {}", output_file.display());
    Ok(true)
}
