use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, instrument, warn};

use super::{create_report, filter_excluded_files, log_note, rule, ReportContext, NO_DIFFERENCES};
use crate::error::Result;
use crate::git::Git;
use crate::snapshot::decode_snapshot;
use crate::types::CommitInfo;

const NO_PARENT: &str = "# (no parent commit)";
const NOT_BEFORE: &str = "# (file did not exist before commit)";
const REMOVED: &str = "# (file removed in commit)";

/// Content of `path` at `commit`, decoded for display, plus the binary flag.
fn snapshot(git: &impl Git, commit: &str, path: &str, missing: &str) -> Result<(String, bool)> {
    Ok(match git.show_blob(commit, path)? {
        Some(raw) => decode_snapshot(&raw),
        None => (missing.to_string(), false),
    })
}

fn write_block(out: &mut impl Write, heading: &str, contents: &str) -> Result<()> {
    writeln!(out, "{heading}")?;
    write!(out, "{contents}")?;
    if !contents.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

/// Writes before/after snapshots and the patch of every file each commit
/// touched, then appends the master comparison when it exists.
///
/// # Errors
///
/// Returns an error if git queries fail or the output cannot be written.
#[instrument(skip_all, fields(commits = commits.len(), include_logs = include_logs))]
pub fn write_touched_files_compilation(
    git: &impl Git,
    commits: &[CommitInfo],
    ctx: &ReportContext<'_>,
    output_file: &Path,
    master_comparison: Option<&Path>,
    include_logs: bool,
) -> Result<bool> {
    info!("Creating touched files compilation...");

    if commits.is_empty() {
        warn!("No commits available for compilation");
        return Ok(false);
    }

    let mut out = create_report(output_file)?;
    ctx.write_header(
        &mut out,
        &format!("# Touched Files{} (commit snapshots)", log_note(include_logs)),
        commits.len(),
    )?;

    for commit in commits {
        let parent = git.commit_parents(&commit.sha)?.into_iter().next();
        let (files, _excluded) = filter_excluded_files(&git.changed_files(&commit.sha)?);
        if files.is_empty() {
            continue;
        }

        writeln!(out, "{}", rule('='))?;
        writeln!(out, "# Commit {}: {}", commit.short, commit.subject)?;
        writeln!(out, "# SHA: {}", commit.sha)?;
        writeln!(out, "# Parent: {}", parent.as_deref().unwrap_or("(none)"))?;
        writeln!(out, "# Files: {}", files.join(", "))?;
        writeln!(out, "{}\n", rule('='))?;

        for file in &files {
            writeln!(out, "{}", rule('-'))?;
            writeln!(out, "# File: {file}")?;
            writeln!(out, "# Commit: {}\n", commit.short)?;

            let (before, before_binary) = match &parent {
                Some(parent) => snapshot(git, parent, file, NOT_BEFORE)?,
                None => (NO_PARENT.to_string(), false),
            };
            let (after, after_binary) = snapshot(git, &commit.sha, file, REMOVED)?;
            if before_binary || after_binary {
                info!(
                    "Skipping binary file contents for {file} in commit {}",
                    commit.short
                );
            }

            let diff_output = git.show_patch(&commit.sha, std::slice::from_ref(file))?;

            write_block(&mut out, "# Before", &before)?;
            write_block(&mut out, "\n# After", &after)?;
            writeln!(out, "\n# Diff")?;
            if diff_output.is_empty() {
                write!(out, "{NO_DIFFERENCES}")?;
            } else {
                write!(out, "{diff_output}")?;
            }
            write!(out, "\n\n")?;
        }
    }

    if let Some(master) = master_comparison.filter(|path| path.exists()) {
        writeln!(out, "{}", rule('='))?;
        writeln!(out, "# Appended master comparison (diffs and summaries)\n")?;
        out.write_all(fs::read_to_string(master)?.as_bytes())?;
    }
    out.flush()?;

    info!("✓ Created touched files compilation: {}", output_file.display());
    Ok(true)
}
