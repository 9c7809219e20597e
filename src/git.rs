use std::path::PathBuf;
use std::process::{Command, Output};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::CommitInfo;

/// Trait defining the version-control operations required by the library
pub trait Git {
    /// Name of the currently checked out branch (empty when detached)
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be determined
    fn current_branch(&self) -> Result<String>;

    /// Checkout a branch
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be checked out
    fn checkout_branch(&self, branch: &str) -> Result<()>;

    /// Fetch branches and tags from a remote, pruning deleted refs
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails
    fn fetch_remote(&self, remote: &str) -> Result<()>;

    /// Resolve a reference to the commit it names, returning the raw lookup output
    ///
    /// # Errors
    ///
    /// Returns an error if the reference does not name a commit
    fn resolve_ref(&self, reference: &str) -> Result<String>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
    ///
    /// # Errors
    ///
    /// Returns an error if the ancestry query itself fails
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Commits on the first-parent path after `start` up to and including `end`,
    /// oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the commits cannot be listed
    fn list_commits_in_range(&self, start: &str, end: &str) -> Result<Vec<String>>;

    /// Fetch the metadata of a commit
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be shown or its output is malformed
    fn commit_info(&self, commit: &str, repo_url: &str) -> Result<CommitInfo>;

    /// Parent commits, first parent first
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be found
    fn commit_parents(&self, commit: &str) -> Result<Vec<String>>;

    /// Files touched by a commit, without duplicates, in the order git reports them
    ///
    /// # Errors
    ///
    /// Returns an error if the file list cannot be retrieved
    fn changed_files(&self, commit: &str) -> Result<Vec<String>>;

    /// Patch introduced by a commit, restricted to `files`
    ///
    /// # Errors
    ///
    /// Returns an error if the patch cannot be produced
    fn show_patch(&self, commit: &str, files: &[String]) -> Result<String>;

    /// Diff between two commits, restricted to `files` when not empty
    ///
    /// # Errors
    ///
    /// Returns an error if the diff cannot be produced
    fn diff_commits(&self, left: &str, right: &str, files: &[String]) -> Result<String>;

    /// Raw content of a file at a commit, `None` when the file does not exist there
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be executed
    fn show_blob(&self, commit: &str, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Implementation of Git operations using the local Git CLI
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    /// Creates a new `GitCli` instance with the given repository path
    #[must_use]
    pub const fn new(repo_path: PathBuf) -> Self {
        Self { repo_path }
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| Error::GitCommandError(e.to_string()))
    }

    /// Run a Git command with the given arguments and return its trimmed stdout
    ///
    /// # Errors
    ///
    /// Returns an error if the git command cannot be executed or exits unsuccessfully
    #[instrument(skip(self), fields(args = ?args, repo_path = %self.repo_path.display()))]
    pub fn run_git_command(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            debug!(error = %error, "Git command failed");
            return Err(Error::GitCommandError(format!(
                "git {}: {}",
                args.join(" "),
                error.trim()
            )));
        }

        let result = String::from_utf8_lossy(&output.stdout).trim().to_string();

        debug!(
            output_length = result.len(),
            "Git command completed successfully"
        );
        Ok(result)
    }

    fn run_git_command_with_paths(&self, args: &[&str], files: &[String]) -> Result<String> {
        let mut full: Vec<&str> = args.to_vec();
        if !files.is_empty() {
            full.push("--");
            full.extend(files.iter().map(String::as_str));
        }
        self.run_git_command(&full)
    }
}

impl Git for GitCli {
    #[instrument(skip(self), fields(repo_path = %self.repo_path.display()))]
    fn current_branch(&self) -> Result<String> {
        self.run_git_command(&["branch", "--show-current"])
    }

    #[instrument(skip(self), fields(branch = %branch, repo_path = %self.repo_path.display()))]
    fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.run_git_command(&["checkout", branch])?;
        debug!("Branch checked out successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(remote = %remote))]
    fn fetch_remote(&self, remote: &str) -> Result<()> {
        self.run_git_command(&["fetch", remote, "--prune", "--tags"])?;
        debug!("Remote fetched successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(reference = %reference))]
    fn resolve_ref(&self, reference: &str) -> Result<String> {
        self.run_git_command(&["rev-parse", "--verify", &format!("{reference}^{{commit}}")])
    }

    #[instrument(skip(self))]
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => {
                let error = String::from_utf8_lossy(&output.stderr);
                debug!(error = %error, "Ancestry check failed");
                Err(Error::GitCommandError(error.trim().to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    fn list_commits_in_range(&self, start: &str, end: &str) -> Result<Vec<String>> {
        let output = self.run_git_command(&[
            "rev-list",
            "--reverse",
            "--first-parent",
            &format!("{start}..{end}"),
        ])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    #[instrument(skip(self, repo_url))]
    fn commit_info(&self, commit: &str, repo_url: &str) -> Result<CommitInfo> {
        let output = self.run_git_command(&[
            "show",
            "-s",
            CommitInfo::SHOW_FORMAT,
            "--date=iso-strict",
            commit,
        ])?;
        CommitInfo::from_show_output(commit, &output, repo_url)
    }

    #[instrument(skip(self))]
    fn commit_parents(&self, commit: &str) -> Result<Vec<String>> {
        let output = self.run_git_command(&["rev-list", "--parents", "-n", "1", commit])?;
        Ok(output
            .split_whitespace()
            .skip(1)
            .map(ToString::to_string)
            .collect())
    }

    #[instrument(skip(self))]
    fn changed_files(&self, commit: &str) -> Result<Vec<String>> {
        let is_merge = self.commit_parents(commit)?.len() > 1;
        // -z keeps paths verbatim; without it git quotes non-ASCII names
        let mut args = vec!["diff-tree", "-z"];
        if is_merge {
            args.push("-m");
        }
        args.extend(["--no-commit-id", "--name-only", "-r", "--root", commit]);

        let output = self.run_git_command(&args)?;
        let mut files: Vec<String> = Vec::new();
        for path in output.split('\0').filter(|path| !path.is_empty()) {
            if !files.iter().any(|f| f == path) {
                files.push(path.to_string());
            }
        }
        debug!(files_count = files.len(), is_merge, "Changed files listed");
        Ok(files)
    }

    #[instrument(skip(self, files), fields(files_count = files.len()))]
    fn show_patch(&self, commit: &str, files: &[String]) -> Result<String> {
        self.run_git_command_with_paths(&["show", "--pretty=format:", commit], files)
    }

    #[instrument(skip(self, files), fields(files_count = files.len()))]
    fn diff_commits(&self, left: &str, right: &str, files: &[String]) -> Result<String> {
        self.run_git_command_with_paths(&["diff", left, right], files)
    }

    #[instrument(skip(self))]
    fn show_blob(&self, commit: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let output = self.output(&["show", &format!("{commit}:{path}")])?;

        if !output.status.success() {
            debug!(status = %output.status, "File not found or command failed");
            return Ok(None);
        }

        debug!(content_length = output.stdout.len(), "File content retrieved");
        Ok(Some(output.stdout))
    }
}
