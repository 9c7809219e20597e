use std::io::Write;
use std::path::Path;
use tracing::{info, instrument, warn};

use super::{create_report, rule, NO_DIFFERENCES};
use crate::error::Result;
use crate::git::Git;
use crate::types::{checks_all_green, CheckResult, CommitInfo};

/// Writes the per-commit report: metadata header, the commit's patch for
/// `files`, and its checks (with fetched logs when `include_logs` is set).
///
/// Returns `Ok(false)` without writing anything when `files` is empty.
///
/// # Errors
///
/// Returns an error if the patch cannot be produced or the file cannot be written.
#[instrument(skip_all, fields(commit = %info.short, include_logs = include_logs))]
pub fn write_commit_report(
    git: &impl Git,
    info: &CommitInfo,
    files: &[String],
    checks: &[CheckResult],
    output_file: &Path,
    include_logs: bool,
) -> Result<bool> {
    info!("Creating diff compilation for commit {}", info.short);

    if files.is_empty() {
        warn!("No files found for commit {}", info.short);
        return Ok(false);
    }

    let diff_output = git.show_patch(&info.sha, files)?;

    let mut out = create_report(output_file)?;
    writeln!(out, "# Commit {}: {}", info.short, info.summary_line())?;
    writeln!(out, "# SHA: {}", info.sha)?;
    writeln!(out, "# Author: {} <{}>", info.author, info.email)?;
    writeln!(out, "# Date: {}", info.date)?;
    writeln!(out, "# URL: {}", info.url)?;
    writeln!(out, "# Body: {}", info.body_line())?;
    writeln!(out, "# Checks green: {}", checks_all_green(checks))?;
    writeln!(out, "# Changed files: {}", files.len())?;
    writeln!(out, "# Files: {}\n", files.join(", "))?;
    writeln!(out, "{}", rule('='))?;
    if diff_output.is_empty() {
        write!(out, "{NO_DIFFERENCES}")?;
    } else {
        write!(out, "{diff_output}")?;
    }
    write!(out, "\n\n")?;
    writeln!(out, "{}", rule('='))?;
    writeln!(out, "Checks ({}):", checks.len())?;

    if checks.is_empty() {
        writeln!(out, "# No checks found")?;
    }
    for check in checks {
        let mut heading = format!(
            "- {}: status={}, conclusion={}",
            check.name, check.status, check.conclusion
        );
        if !check.details_url.is_empty() {
            heading.push_str(&format!(" [{}]", check.details_url));
        }
        writeln!(out, "{heading}")?;

        let summary = if check.summary.is_empty() {
            &check.title
        } else {
            &check.summary
        };
        for line in summary.lines() {
            writeln!(out, "    {line}")?;
        }

        if include_logs {
            if let Some(log) = check.log_output.as_deref().filter(|log| !log.is_empty()) {
                writeln!(out, "    Logs:")?;
                for line in log.lines() {
                    writeln!(out, "    {line}")?;
                }
            }
        }
    }
    writeln!(out)?;
    out.flush()?;

    info!("✓ Created diff: {}", output_file.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{check, sha, FakeGit};
    use std::fs;
    use tree_fs::TreeBuilder;

    fn info(git: &FakeGit, index: usize) -> CommitInfo {
        git.commit_info(&sha(index), "https://github.com/acme/widgets")
            .expect("commit exists")
    }

    #[test]
    fn writes_header_patch_and_checks() {
        let tree = TreeBuilder::default().create().expect("temp dir");
        let git = FakeGit::linear(2);
        let info = info(&git, 1);
        let files = vec!["src/file1.rs".to_string()];
        let mut failed = check("test", "failure", "https://github.com/acme/widgets/actions/runs/9");
        failed.log_output = Some("error: boom".to_string());
        let checks = vec![check("lint", "success", ""), failed];
        let path = tree.root.join("report.txt");

        assert!(write_commit_report(&git, &info, &files, &checks, &path, false).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&format!("# Commit {}: Commit 1\n", info.short)));
        assert!(content.contains("# Author: Test User <test@example.com>"));
        assert!(content.contains(&format!("# URL: https://github.com/acme/widgets/commit/{}", sha(1))));
        assert!(content.contains("# Checks green: false"));
        assert!(content.contains("# Files: src/file1.rs"));
        assert!(content.contains(&format!("patch {} -- src/file1.rs", &sha(1)[..8])));
        assert!(content.contains("Checks (2):"));
        assert!(content.contains(
            "- test: status=completed, conclusion=failure [https://github.com/acme/widgets/actions/runs/9]"
        ));
        assert!(content.contains("    test finished"));
        assert!(!content.contains("Logs:"));
    }

    #[test]
    fn span_records_log_variant() {
        use crate::testing::SpanFields;
        use tracing_subscriber::layer::SubscriberExt;

        let tree = TreeBuilder::default().create().expect("temp dir");
        let git = FakeGit::linear(1);
        let info = info(&git, 0);
        let files = vec!["src/file0.rs".to_string()];
        let spans = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(spans.clone());

        tracing::subscriber::with_default(subscriber, || {
            write_commit_report(&git, &info, &files, &[], &tree.root.join("r.txt"), true).unwrap()
        });

        let recorded = spans.recorded();
        assert!(recorded.contains(&("include_logs".to_string(), "true".to_string())));
        assert!(recorded.contains(&("commit".to_string(), info.short.clone())));
    }

    #[test]
    fn includes_logs_only_when_requested() {
        let tree = TreeBuilder::default().create().expect("temp dir");
        let git = FakeGit::linear(1);
        let info = info(&git, 0);
        let files = vec!["src/file0.rs".to_string()];
        let mut failed = check("test", "failure", "");
        failed.log_output = Some("line a\nline b".to_string());
        let path = tree.root.join("nested/with-logs.txt");

        assert!(write_commit_report(&git, &info, &files, &[failed], &path, true).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("    Logs:\n    line a\n    line b\n"));
    }

    #[test]
    fn no_checks_are_reported_as_such() {
        let tree = TreeBuilder::default().create().expect("temp dir");
        let git = FakeGit::linear(1);
        let path = tree.root.join("report.txt");
        let files = vec!["src/file0.rs".to_string()];

        assert!(write_commit_report(&git, &info(&git, 0), &files, &[], &path, false).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Checks green: false"));
        assert!(content.contains("Checks (0):\n# No checks found\n"));
    }

    #[test]
    fn empty_file_list_writes_nothing() {
        let tree = TreeBuilder::default().create().expect("temp dir");
        let git = FakeGit::linear(1);
        let path = tree.root.join("report.txt");

        assert!(!write_commit_report(&git, &info(&git, 0), &[], &[], &path, false).unwrap());
        assert!(!path.exists());
    }
}
