use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::git::{Git, GitCli};
use crate::host::{CodeHost, GhCli};
use crate::report::{self, ReportContext};
use crate::selection::Selection;
use crate::types::{CheckResult, CommitInfo, ProcessedCommit};

/// Run configuration
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Branch that must be checked out before the run and is restored afterwards
    pub base_branch: String,
    /// Remote fetched before any commit is processed
    pub remote: String,
    /// Directory receiving every generated report
    pub output_dir: PathBuf,
    /// Whether to check the base branch out again when the run ends
    pub cleanup: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            remote: "origin".to_string(),
            output_dir: std::env::temp_dir(),
            cleanup: true,
        }
    }
}

/// Aggregate reports produced for one variant (with or without logs).
#[derive(Debug, Default, Clone)]
pub struct AggregateReports {
    pub commit_reports: Vec<PathBuf>,
    pub master: Option<PathBuf>,
    pub summary: Option<PathBuf>,
    pub touched: Option<PathBuf>,
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub requested: usize,
    pub processed: Vec<ProcessedCommit>,
    /// Commits whose metadata could not be fetched
    pub missing: Vec<String>,
    /// Selected commits without a per-commit report
    pub skipped: Vec<String>,
    pub plain: AggregateReports,
    pub with_logs: AggregateReports,
    pub round_robin: Vec<PathBuf>,
}

/// Everything gathered for one commit before its reports are written.
struct CommitWork {
    info: CommitInfo,
    files: Vec<String>,
    checks: Vec<CheckResult>,
    checks_with_logs: Vec<CheckResult>,
}

fn check_interrupted(interrupted: &AtomicBool) -> Result<()> {
    if interrupted.load(Ordering::SeqCst) {
        return Err(Error::Interrupted);
    }
    Ok(())
}

/// Keeps going after a failed report, logging the failure.
fn contain<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Failed to create {what}");
            None
        }
    }
}

/// Drives a batch run: branch checks, fetching, per-commit reports and aggregates
pub struct BatchProcessor<G, H> {
    git: G,
    host: H,
    options: BatchOptions,
}

impl BatchProcessor<GitCli, GhCli> {
    /// Create a processor backed by the `git` and `gh` command line tools
    #[must_use]
    pub fn new_from_local(repo_path: &Path, options: BatchOptions) -> Self {
        debug!(
            path = %repo_path.display(),
            options = ?options,
            "Creating processor from local repository"
        );
        Self::new(
            GitCli::new(repo_path.to_path_buf()),
            GhCli::new(repo_path.to_path_buf()),
            options,
        )
    }
}

impl<G: Git, H: CodeHost> BatchProcessor<G, H> {
    pub const fn new(git: G, host: H, options: BatchOptions) -> Self {
        Self { git, host, options }
    }

    #[must_use]
    pub const fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Parse a selection string against the repository. Performs no writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Selection`] when the selection is malformed or unresolvable.
    pub fn parse_selection(&self, input: &str) -> Result<Selection> {
        Ok(Selection::parse(&self.git, input)?)
    }

    /// Ensure the base branch is currently checked out
    ///
    /// # Errors
    ///
    /// Returns [`Error::BranchMismatch`] when another branch is checked out.
    pub fn ensure_base_branch(&self) -> Result<()> {
        let current = self.git.current_branch()?;
        if current != self.options.base_branch {
            return Err(Error::BranchMismatch {
                expected: self.options.base_branch.clone(),
                actual: current,
            });
        }
        info!("✓ Starting from {} branch", self.options.base_branch);
        Ok(())
    }

    /// Check the base branch out again unless cleanup is disabled. Failures are only logged.
    pub fn cleanup(&self) {
        if !self.options.cleanup {
            debug!("Cleanup disabled, staying on current branch");
            return;
        }
        let branch = &self.options.base_branch;
        info!("Checking out {branch} branch...");
        match self.git.checkout_branch(branch) {
            Ok(()) => info!("✓ Returned to {branch} branch"),
            Err(e) => warn!(error = %e, "Failed to return to {branch} branch"),
        }
    }

    fn fetch_checks(&self, repo: Option<&str>, info: &CommitInfo) -> Vec<CheckResult> {
        let Some(repo) = repo else {
            warn!("Repository identity unknown, skipping checks for {}", info.short);
            return Vec::new();
        };
        match self.host.commit_checks(repo, &info.sha) {
            Ok(checks) => checks,
            Err(e) => {
                warn!(error = %e, "Failed to retrieve checks for commit {}", info.short);
                Vec::new()
            }
        }
    }

    /// Copies `checks`, attaching run logs to failed checks that link to a pipeline run.
    fn attach_failed_logs(&self, checks: &[CheckResult]) -> Vec<CheckResult> {
        checks
            .iter()
            .cloned()
            .map(|mut check| {
                if check.is_passing() {
                    return check;
                }
                if let Some(run_id) = check.actions_run_id() {
                    info!("Fetching logs for failed check '{}' (run {run_id})", check.name);
                    match self.host.run_log(run_id) {
                        Ok(log) if !log.is_empty() => check.log_output = Some(log),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Failed to fetch logs for run {run_id}"),
                    }
                }
                check
            })
            .collect()
    }

    fn collect_infos(
        &self,
        selection: &Selection,
        repo_url: &str,
        interrupted: &AtomicBool,
    ) -> Result<(Vec<CommitInfo>, Vec<String>)> {
        info!("Collecting info for commit selection: {}...", selection.canonical());
        let mut infos = Vec::with_capacity(selection.commits.len());
        let mut missing = Vec::new();
        for commit in &selection.commits {
            check_interrupted(interrupted)?;
            match self.git.commit_info(commit, repo_url) {
                Ok(info) => {
                    info!("  {}: {}", info.short, info.subject);
                    infos.push(info);
                }
                Err(e) => {
                    warn!(error = %e, "  {}: Not found or inaccessible", &commit[..8.min(commit.len())]);
                    missing.push(commit.clone());
                }
            }
        }
        Ok((infos, missing))
    }

    fn gather(&self, info: CommitInfo, repo: Option<&str>) -> Option<CommitWork> {
        info!("--- Processing commit {}: {} ---", info.short, info.subject);

        let files = match self.git.changed_files(&info.sha) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Failed to list changed files for commit {}", info.short);
                return None;
            }
        };
        if files.is_empty() {
            info!("No changed files found for commit {}", info.short);
            return None;
        }
        info!("Total changed files: {}", files.len());

        let (files, _excluded) = report::filter_excluded_files(&files);
        if files.is_empty() {
            info!(
                "No files to process for commit {} (all files were excluded)",
                info.short
            );
            return None;
        }
        info!("Files to process ({}): {}", files.len(), files.join(", "));

        let checks = self.fetch_checks(repo, &info);
        let checks_with_logs = self.attach_failed_logs(&checks);
        Some(CommitWork {
            info,
            files,
            checks,
            checks_with_logs,
        })
    }

    fn write_commit_variant(
        &self,
        work: &CommitWork,
        include_logs: bool,
    ) -> Option<ProcessedCommit> {
        let checks = if include_logs {
            &work.checks_with_logs
        } else {
            &work.checks
        };
        let path = report::commit_report_path(&self.options.output_dir, &work.info.short, include_logs);
        let written = report::write_commit_report(
            &self.git,
            &work.info,
            &work.files,
            checks,
            &path,
            include_logs,
        );
        contain("commit report", written)?.then(|| ProcessedCommit {
            info: work.info.clone(),
            report: path,
            files: work.files.clone(),
        })
    }

    fn write_aggregates(
        &self,
        processed: &[ProcessedCommit],
        infos: &[CommitInfo],
        ctx: &ReportContext<'_>,
        include_logs: bool,
        interrupted: &AtomicBool,
    ) -> Result<AggregateReports> {
        let dir = &self.options.output_dir;
        let tag = ctx.selection.tag();
        let mut reports = AggregateReports {
            commit_reports: processed.iter().map(|p| p.report.clone()).collect(),
            ..AggregateReports::default()
        };

        check_interrupted(interrupted)?;
        let master = report::aggregate_report_path(dir, "comparison", &tag, include_logs);
        if contain(
            "master comparison",
            report::write_master_comparison(processed, ctx, &master, include_logs),
        ) == Some(true)
        {
            reports.master = Some(master);
        }

        check_interrupted(interrupted)?;
        let summary = report::aggregate_report_path(dir, "summaries", &tag, include_logs);
        if contain(
            "summary compilation",
            report::write_summary_compilation(processed, ctx, &summary, include_logs),
        ) == Some(true)
        {
            reports.summary = Some(summary);
        }

        check_interrupted(interrupted)?;
        let touched = report::aggregate_report_path(dir, "touched-files", &tag, include_logs);
        if contain(
            "touched files compilation",
            report::write_touched_files_compilation(
                &self.git,
                infos,
                ctx,
                &touched,
                reports.master.as_deref(),
                include_logs,
            ),
        ) == Some(true)
        {
            reports.touched = Some(touched);
        }

        Ok(reports)
    }

    /// Generate every report for `selection`.
    ///
    /// Lookup and generation failures are logged and contained to the commit or
    /// report they concern. `interrupted` is polled between units of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be fetched, the output directory
    /// cannot be created, no commit metadata can be fetched
    /// ([`Error::NoValidCommits`]), or the run is interrupted.
    ///
    /// A failure raised after `interrupted` was set (a git child killed by the
    /// same Ctrl-C, for instance) is reported as [`Error::Interrupted`].
    #[instrument(skip_all, fields(commits = selection.commits.len()))]
    pub fn run(&self, selection: &Selection, interrupted: &AtomicBool) -> Result<RunSummary> {
        self.run_batch(selection, interrupted).map_err(|e| {
            if interrupted.load(Ordering::SeqCst) {
                debug!(error = %e, "Failure after interrupt");
                Error::Interrupted
            } else {
                e
            }
        })
    }

    fn run_batch(&self, selection: &Selection, interrupted: &AtomicBool) -> Result<RunSummary> {
        check_interrupted(interrupted)?;
        info!("Fetching remote branches from {}...", self.options.remote);
        self.git.fetch_remote(&self.options.remote)?;
        info!("✓ Fetched remote branches");

        if !self.options.output_dir.exists() {
            debug!(path = %self.options.output_dir.display(), "Creating output directory");
            fs::create_dir_all(&self.options.output_dir)?;
        }

        let repo_url = self.host.repo_url().unwrap_or_else(|e| {
            warn!(error = %e, "Could not determine repository URL");
            String::new()
        });
        let repo_name = match self.host.repo_name_with_owner() {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(error = %e, "Could not determine repository name, checks will be skipped");
                None
            }
        };

        let (infos, missing) = self.collect_infos(selection, &repo_url, interrupted)?;
        if infos.is_empty() {
            return Err(Error::NoValidCommits);
        }

        let mut processed = Vec::with_capacity(infos.len());
        let mut processed_with_logs = Vec::with_capacity(infos.len());
        for info in &infos {
            check_interrupted(interrupted)?;
            let Some(work) = self.gather(info.clone(), repo_name.as_deref()) else {
                continue;
            };
            if let Some(commit) = self.write_commit_variant(&work, false) {
                processed.push(commit);
            }
            if let Some(commit) = self.write_commit_variant(&work, true) {
                processed_with_logs.push(commit);
            }
        }

        let processed_shas: HashSet<&str> = processed.iter().map(|p| p.info.sha.as_str()).collect();
        let skipped = selection
            .commits
            .iter()
            .filter(|c| !processed_shas.contains(c.as_str()))
            .cloned()
            .collect();

        let ctx = ReportContext::new(selection);
        let mut summary = RunSummary {
            requested: selection.commits.len(),
            missing,
            skipped,
            ..RunSummary::default()
        };

        if processed.is_empty() {
            warn!("No commits were successfully processed (without logs)");
        } else {
            summary.plain = self.write_aggregates(&processed, &infos, &ctx, false, interrupted)?;
            check_interrupted(interrupted)?;
            summary.round_robin = contain(
                "round-robin comparisons",
                report::write_round_robin_comparisons(
                    &self.git,
                    &processed,
                    &ctx,
                    &self.options.output_dir,
                ),
            )
            .unwrap_or_default();
        }

        if processed_with_logs.is_empty() {
            warn!("No commits were successfully processed (with logs)");
        } else {
            summary.with_logs =
                self.write_aggregates(&processed_with_logs, &infos, &ctx, true, interrupted)?;
        }

        summary.processed = processed;
        Ok(summary)
    }
}
