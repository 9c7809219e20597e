use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::{create_report, round_robin_path, rule, ReportContext, NO_DIFFERENCES};
use crate::error::Result;
use crate::git::Git;
use crate::types::ProcessedCommit;

/// Union of both file lists, sorted and without duplicates.
fn combined_files(left: &[String], right: &[String]) -> Vec<String> {
    let mut files: Vec<String> = left.iter().chain(right).cloned().collect();
    files.sort();
    files.dedup();
    files
}

fn write_pair(
    git: &impl Git,
    left: &ProcessedCommit,
    right: &ProcessedCommit,
    ctx: &ReportContext<'_>,
    output_file: &Path,
) -> Result<()> {
    let files = combined_files(&left.files, &right.files);
    let diff_output = git.diff_commits(&left.info.sha, &right.info.sha, &files)?;

    let (l, r) = (&left.info, &right.info);
    let left_summary = l.summary_line();
    let right_summary = r.summary_line();
    let short = |sha: &str| sha.get(..8).unwrap_or(sha).to_string();

    let mut out = create_report(output_file)?;
    writeln!(
        out,
        "# Commit {} vs {}: {left_summary} ↔ {right_summary}",
        short(&l.sha),
        short(&r.sha)
    )?;
    ctx.write_selection_header(&mut out)?;
    writeln!(out, "# Generated: {}", ctx.generated)?;
    writeln!(out, "# Left SHA: {}", l.sha)?;
    writeln!(out, "# Right SHA: {}", r.sha)?;
    writeln!(out, "# Left author: {}", l.author)?;
    writeln!(out, "# Right author: {}", r.author)?;
    writeln!(out, "# Left URL: {}", l.url)?;
    writeln!(out, "# Right URL: {}", r.url)?;
    writeln!(out, "# Left summary: {left_summary}")?;
    writeln!(out, "# Right summary: {right_summary}")?;
    writeln!(out, "# Files compared: {}", files.len())?;
    writeln!(out, "# Files: {}\n", files.join(", "))?;
    writeln!(out, "{}", rule('='))?;
    if diff_output.is_empty() {
        write!(out, "{NO_DIFFERENCES}")?;
    } else {
        write!(out, "{diff_output}")?;
    }
    write!(out, "\n\n")?;
    out.flush()?;
    Ok(())
}

/// Writes one comparison file for every unordered pair of processed commits,
/// in selection order. The number of files grows quadratically.
///
/// A pair whose diff or file fails is logged and skipped; the returned paths
/// are the files actually written.
///
/// # Errors
///
/// Currently infallible; the `Result` keeps the generator signatures uniform.
#[instrument(skip_all, fields(commits = commits.len()))]
pub fn write_round_robin_comparisons(
    git: &impl Git,
    commits: &[ProcessedCommit],
    ctx: &ReportContext<'_>,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    info!("Creating round-robin comparisons...");

    if commits.len() < 2 {
        warn!("Not enough commits for round-robin comparisons");
        return Ok(Vec::new());
    }

    let mut output_files = Vec::with_capacity(commits.len() * (commits.len() - 1) / 2);
    for (idx, left) in commits.iter().enumerate() {
        for right in &commits[idx + 1..] {
            let output_file = round_robin_path(output_dir, &left.info.sha, &right.info.sha);
            if let Err(e) = write_pair(git, left, right, ctx, &output_file) {
                warn!(
                    error = %e,
                    left = %left.info.short,
                    right = %right.info.short,
                    "Skipping round-robin comparison"
                );
                continue;
            }
            output_files.push(output_file);
        }
    }

    info!(
        "✓ Created {} round-robin comparison file(s) for selection {}",
        output_files.len(),
        ctx.selection.canonical()
    );
    Ok(output_files)
}
