use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Conclusions that count as a passing check.
const PASSING_CONCLUSIONS: [&str; 3] = ["success", "neutral", "skipped"];

/// Metadata of a single commit, fetched once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub short: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub subject: String,
    pub body: String,
    pub url: String,
}

impl CommitInfo {
    /// Format string for `git show -s` producing NUL separated fields that
    /// [`CommitInfo::from_show_output`] understands.
    pub const SHOW_FORMAT: &'static str = "--format=%H%x00%h%x00%an%x00%ae%x00%ad%x00%s%x00%b";

    /// Parses the output of `git show -s` run with [`CommitInfo::SHOW_FORMAT`].
    ///
    /// # Errors
    ///
    /// Returns a lookup error when fewer than seven fields are present.
    pub fn from_show_output(commit: &str, output: &str, repo_url: &str) -> Result<Self> {
        let parts: Vec<&str> = output.split('\0').collect();
        if parts.len() < 7 {
            return Err(Error::Lookup {
                commit: commit.to_string(),
                message: "unexpected git show output".to_string(),
            });
        }

        let sha = parts[0].trim().to_string();
        let url = if repo_url.is_empty() {
            String::new()
        } else {
            format!("{repo_url}/commit/{sha}")
        };

        Ok(Self {
            short: parts[1].to_string(),
            author: parts[2].to_string(),
            email: parts[3].to_string(),
            date: parts[4].to_string(),
            subject: parts[5].to_string(),
            body: parts[6].trim().to_string(),
            url,
            sha,
        })
    }

    /// Subject collapsed onto a single line.
    #[must_use]
    pub fn summary_line(&self) -> String {
        collapse_whitespace(&self.subject, "(no subject)")
    }

    /// Body collapsed onto a single line.
    #[must_use]
    pub fn body_line(&self) -> String {
        collapse_whitespace(&self.body, "(no body provided)")
    }
}

fn collapse_whitespace(text: &str, fallback: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// A pipeline check run.
    CheckRun,
    /// A legacy commit status entry.
    Status,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CheckRun => f.write_str("check-run"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// A CI signal attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub name: String,
    pub status: String,
    pub conclusion: String,
    pub details_url: String,
    pub title: String,
    pub summary: String,
    pub log_output: Option<String>,
}

impl CheckResult {
    /// Whether the check concluded successfully (`success`, `neutral` or `skipped`).
    #[must_use]
    pub fn is_passing(&self) -> bool {
        let verdict = if self.conclusion.is_empty() {
            &self.status
        } else {
            &self.conclusion
        };
        let verdict = verdict.to_lowercase();
        PASSING_CONCLUSIONS.contains(&verdict.as_str())
    }

    /// Extracts the GitHub Actions run id from the details link, if any.
    #[must_use]
    pub fn actions_run_id(&self) -> Option<&str> {
        let (_, rest) = self.details_url.split_once("/actions/runs/")?;
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    }
}

/// Returns true only when there is at least one check and every check passes.
#[must_use]
pub fn checks_all_green(checks: &[CheckResult]) -> bool {
    !checks.is_empty() && checks.iter().all(CheckResult::is_passing)
}

/// A commit whose per-commit report was written successfully.
#[derive(Debug, Clone)]
pub struct ProcessedCommit {
    pub info: CommitInfo,
    pub report: PathBuf,
    pub files: Vec<String>,
}
