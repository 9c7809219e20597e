use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{CheckKind, CheckResult};

/// Trait defining the code-hosting operations required by the library
pub trait CodeHost {
    /// Web URL of the repository, e.g. `https://github.com/owner/name`
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be identified
    fn repo_url(&self) -> Result<String>;

    /// Repository identity in `owner/name` form
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be identified
    fn repo_name_with_owner(&self) -> Result<String>;

    /// Check runs followed by status entries reported for a commit
    ///
    /// # Errors
    ///
    /// Returns an error if either API call fails or returns malformed JSON
    fn commit_checks(&self, repo: &str, commit: &str) -> Result<Vec<CheckResult>>;

    /// Full log of a pipeline run
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be retrieved
    fn run_log(&self, run_id: &str) -> Result<String>;
}

#[derive(Debug, Default, Deserialize)]
struct CheckRunsResponse {
    #[serde(default)]
    check_runs: Option<Vec<RawCheck>>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    statuses: Option<Vec<RawCheck>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCheckOutput {
    title: Option<String>,
    summary: Option<String>,
    text: Option<String>,
}

/// Union of the fields used by check runs and commit statuses.
#[derive(Debug, Default, Deserialize)]
struct RawCheck {
    name: Option<String>,
    context: Option<String>,
    status: Option<String>,
    state: Option<String>,
    conclusion: Option<String>,
    details_url: Option<String>,
    target_url: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    text: Option<String>,
    description: Option<String>,
    output: Option<RawCheckOutput>,
}

fn first_present(candidates: &[Option<&String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .find(|value| !value.is_empty())
        .map(|value| (*value).clone())
}

impl RawCheck {
    fn normalize(self, kind: CheckKind) -> CheckResult {
        let output = self.output.unwrap_or_default();
        CheckResult {
            kind,
            name: first_present(&[self.name.as_ref(), self.context.as_ref()])
                .unwrap_or_else(|| "unknown check".to_string()),
            status: first_present(&[self.status.as_ref(), self.state.as_ref()])
                .unwrap_or_else(|| "unknown".to_string()),
            conclusion: first_present(&[self.conclusion.as_ref(), self.state.as_ref()])
                .unwrap_or_else(|| "unknown".to_string()),
            details_url: first_present(&[self.details_url.as_ref(), self.target_url.as_ref()])
                .unwrap_or_default(),
            title: first_present(&[output.title.as_ref(), self.title.as_ref()]).unwrap_or_default(),
            summary: first_present(&[
                output.summary.as_ref(),
                self.summary.as_ref(),
                output.text.as_ref(),
                self.text.as_ref(),
                self.description.as_ref(),
            ])
            .unwrap_or_default(),
            log_output: None,
        }
    }
}

/// Parses a `commits/{sha}/check-runs` API response.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON.
pub fn parse_check_runs(body: &str) -> Result<Vec<CheckResult>> {
    let response: CheckRunsResponse = serde_json::from_str(body)?;
    Ok(response
        .check_runs
        .unwrap_or_default()
        .into_iter()
        .map(|raw| raw.normalize(CheckKind::CheckRun))
        .collect())
}

/// Parses a `commits/{sha}/status` API response.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON.
pub fn parse_statuses(body: &str) -> Result<Vec<CheckResult>> {
    let response: StatusResponse = serde_json::from_str(body)?;
    Ok(response
        .statuses
        .unwrap_or_default()
        .into_iter()
        .map(|raw| raw.normalize(CheckKind::Status))
        .collect())
}

/// Implementation of host operations using the GitHub CLI (`gh`)
pub struct GhCli {
    repo_path: PathBuf,
}

impl GhCli {
    /// Creates a new `GhCli` running inside the given repository
    #[must_use]
    pub const fn new(repo_path: PathBuf) -> Self {
        Self { repo_path }
    }

    #[instrument(skip(self), fields(args = ?args))]
    fn run_gh_command(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| Error::HostCommandError(e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            debug!(error = %error, "gh command failed");
            return Err(Error::HostCommandError(format!(
                "gh {}: {}",
                args.join(" "),
                error.trim()
            )));
        }

        let result = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(output_length = result.len(), "gh command completed");
        Ok(result)
    }
}

impl CodeHost for GhCli {
    fn repo_url(&self) -> Result<String> {
        self.run_gh_command(&["repo", "view", "--json", "url", "-q", ".url"])
    }

    fn repo_name_with_owner(&self) -> Result<String> {
        self.run_gh_command(&["repo", "view", "--json", "nameWithOwner", "-q", ".nameWithOwner"])
    }

    #[instrument(skip(self))]
    fn commit_checks(&self, repo: &str, commit: &str) -> Result<Vec<CheckResult>> {
        let check_runs =
            self.run_gh_command(&["api", &format!("repos/{repo}/commits/{commit}/check-runs")])?;
        let statuses =
            self.run_gh_command(&["api", &format!("repos/{repo}/commits/{commit}/status")])?;

        let mut checks = parse_check_runs(&check_runs)?;
        checks.extend(parse_statuses(&statuses)?);
        debug!(checks_count = checks.len(), "Checks retrieved");
        Ok(checks)
    }

    fn run_log(&self, run_id: &str) -> Result<String> {
        self.run_gh_command(&["run", "view", run_id, "--log"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_runs_with_nested_output() {
        let body = r#"{
            "total_count": 2,
            "check_runs": [
                {
                    "name": "build",
                    "status": "completed",
                    "conclusion": "failure",
                    "details_url": "https://github.com/o/r/actions/runs/42/job/7",
                    "output": {"title": "Build failed", "summary": "2 errors", "text": null}
                },
                {"status": "in_progress", "conclusion": null}
            ]
        }"#;

        let checks = parse_check_runs(body).expect("valid json");
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].kind, CheckKind::CheckRun);
        assert_eq!(checks[0].title, "Build failed");
        assert_eq!(checks[0].summary, "2 errors");
        assert_eq!(checks[0].actions_run_id(), Some("42"));
        assert_eq!(checks[1].name, "unknown check");
        assert_eq!(checks[1].conclusion, "unknown");
    }

    #[test]
    fn status_entries_fall_back_to_state_and_context() {
        let body = r#"{
            "state": "pending",
            "statuses": [
                {"context": "ci/lint", "state": "success", "target_url": "https://ci.example.com/1", "description": "ok"}
            ]
        }"#;

        let checks = parse_statuses(body).expect("valid json");
        assert_eq!(checks.len(), 1);
        let status = &checks[0];
        assert_eq!(status.kind, CheckKind::Status);
        assert_eq!(status.name, "ci/lint");
        assert_eq!(status.status, "success");
        assert_eq!(status.conclusion, "success");
        assert_eq!(status.details_url, "https://ci.example.com/1");
        assert_eq!(status.summary, "ok");
        assert!(status.is_passing());
    }

    #[test]
    fn missing_lists_yield_no_checks() {
        assert!(parse_check_runs("{}").expect("valid json").is_empty());
        assert!(parse_statuses(r#"{"statuses": null}"#).expect("valid json").is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(parse_check_runs("not json"), Err(Error::Json(_))));
    }
}
