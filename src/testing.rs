use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::error::{Error, Result};
use crate::git::Git;
use crate::host::CodeHost;
use crate::types::{CheckKind, CheckResult, CommitInfo};

/// Deterministic 40 character id whose first 7 characters (the abbreviated
/// id) are already unique per index.
pub fn sha(index: usize) -> String {
    format!("{:07x}{:033x}", 0xa00_0000 + index, index)
}

struct FakeCommit {
    sha: String,
    parents: Vec<String>,
    subject: String,
    files: Vec<String>,
}

/// In-memory repository with a linear history `c0 <- c1 <- ... <- cN`.
pub struct FakeGit {
    commits: Vec<FakeCommit>,
    refs: HashMap<String, String>,
    blobs: HashMap<(String, String), Vec<u8>>,
    missing_info: HashSet<String>,
    failing_diffs: HashSet<String>,
    interrupt_on_fetch: Option<Arc<AtomicBool>>,
    pub branch: RefCell<String>,
    pub checkouts: RefCell<Vec<String>>,
    pub fetched: RefCell<Vec<String>>,
}

impl FakeGit {
    pub fn linear(count: usize) -> Self {
        let mut commits = Vec::with_capacity(count);
        let mut refs = HashMap::new();
        let mut blobs = HashMap::new();
        for i in 0..count {
            let id = sha(i);
            let file = format!("src/file{i}.rs");
            blobs.insert((id.clone(), file.clone()), format!("content {i}\n").into_bytes());
            refs.insert(format!("c{i}"), id.clone());
            commits.push(FakeCommit {
                parents: if i == 0 { Vec::new() } else { vec![sha(i - 1)] },
                subject: format!("Commit {i}"),
                files: vec![file],
                sha: id,
            });
        }
        Self {
            commits,
            refs,
            blobs,
            missing_info: HashSet::new(),
            failing_diffs: HashSet::new(),
            interrupt_on_fetch: None,
            branch: RefCell::new("main".to_string()),
            checkouts: RefCell::new(Vec::new()),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Makes `name` resolve to `output` verbatim.
    pub fn with_ref(mut self, name: &str, output: &str) -> Self {
        self.refs.insert(name.to_string(), output.to_string());
        self
    }

    pub fn with_files(mut self, index: usize, files: &[&str]) -> Self {
        self.commits[index].files = files.iter().map(ToString::to_string).collect();
        self
    }

    pub fn with_blob(mut self, index: usize, path: &str, content: &[u8]) -> Self {
        self.blobs
            .insert((sha(index), path.to_string()), content.to_vec());
        self
    }

    pub fn with_missing_info(mut self, index: usize) -> Self {
        self.missing_info.insert(sha(index));
        self
    }

    /// Makes every pairwise diff involving the commit fail.
    pub fn with_failing_diff(mut self, index: usize) -> Self {
        self.failing_diffs.insert(sha(index));
        self
    }

    /// Raises `flag` and fails the fetch, like a Ctrl-C killing `git fetch`.
    pub fn with_interrupt_on_fetch(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt_on_fetch = Some(flag);
        self
    }

    pub fn on_branch(self, branch: &str) -> Self {
        *self.branch.borrow_mut() = branch.to_string();
        self
    }

    fn find(&self, commit: &str) -> Result<&FakeCommit> {
        self.commits
            .iter()
            .find(|c| c.sha == commit)
            .ok_or_else(|| Error::GitCommandError(format!("unknown commit {commit}")))
    }
}

impl Git for FakeGit {
    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.borrow().clone())
    }

    fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.checkouts.borrow_mut().push(branch.to_string());
        *self.branch.borrow_mut() = branch.to_string();
        Ok(())
    }

    fn fetch_remote(&self, remote: &str) -> Result<()> {
        self.fetched.borrow_mut().push(remote.to_string());
        if let Some(flag) = &self.interrupt_on_fetch {
            flag.store(true, Ordering::SeqCst);
            return Err(Error::GitCommandError("fetch killed by signal".to_string()));
        }
        Ok(())
    }

    fn resolve_ref(&self, reference: &str) -> Result<String> {
        if let Some(output) = self.refs.get(reference) {
            return Ok(output.clone());
        }
        let matches: Vec<&FakeCommit> = self
            .commits
            .iter()
            .filter(|c| reference.len() >= 4 && c.sha.starts_with(reference))
            .collect();
        match matches.as_slice() {
            [single] => Ok(single.sha.clone()),
            _ => Err(Error::GitCommandError(format!("unknown revision {reference}"))),
        }
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let mut pending = vec![descendant.to_string()];
        while let Some(current) = pending.pop() {
            if current == ancestor {
                return Ok(true);
            }
            pending.extend(self.find(&current)?.parents.iter().cloned());
        }
        Ok(false)
    }

    fn list_commits_in_range(&self, start: &str, end: &str) -> Result<Vec<String>> {
        let mut range = Vec::new();
        let mut current = Some(end.to_string());
        while let Some(commit) = current {
            if commit == start {
                break;
            }
            current = self.find(&commit)?.parents.first().cloned();
            range.push(commit);
        }
        range.reverse();
        Ok(range)
    }

    fn commit_info(&self, commit: &str, repo_url: &str) -> Result<CommitInfo> {
        if self.missing_info.contains(commit) {
            return Err(Error::GitCommandError(format!("bad object {commit}")));
        }
        let found = self.find(commit)?;
        let output = format!(
            "{}\0{}\0Test User\0test@example.com\02024-01-01T00:00:00+00:00\0{}\0Body of {}\n",
            found.sha,
            &found.sha[..7],
            found.subject,
            found.subject
        );
        CommitInfo::from_show_output(commit, &output, repo_url)
    }

    fn commit_parents(&self, commit: &str) -> Result<Vec<String>> {
        Ok(self.find(commit)?.parents.clone())
    }

    fn changed_files(&self, commit: &str) -> Result<Vec<String>> {
        Ok(self.find(commit)?.files.clone())
    }

    fn show_patch(&self, commit: &str, files: &[String]) -> Result<String> {
        Ok(format!("patch {} -- {}", &commit[..8], files.join(" ")))
    }

    fn diff_commits(&self, left: &str, right: &str, files: &[String]) -> Result<String> {
        if self.failing_diffs.contains(left) || self.failing_diffs.contains(right) {
            return Err(Error::GitCommandError(format!("cannot diff {left} {right}")));
        }
        Ok(format!(
            "diff {} {} -- {}",
            &left[..8],
            &right[..8],
            files.join(" ")
        ))
    }

    fn show_blob(&self, commit: &str, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .get(&(commit.to_string(), path.to_string()))
            .cloned())
    }
}

pub fn check(name: &str, conclusion: &str, details_url: &str) -> CheckResult {
    CheckResult {
        kind: CheckKind::CheckRun,
        name: name.to_string(),
        status: "completed".to_string(),
        conclusion: conclusion.to_string(),
        details_url: details_url.to_string(),
        title: String::new(),
        summary: format!("{name} finished"),
        log_output: None,
    }
}

/// In-memory code host.
#[derive(Default)]
pub struct FakeHost {
    checks: HashMap<String, Vec<CheckResult>>,
    failing_checks: HashSet<String>,
    logs: HashMap<String, String>,
    pub log_requests: RefCell<Vec<String>>,
}

impl FakeHost {
    pub fn with_checks(mut self, index: usize, checks: Vec<CheckResult>) -> Self {
        self.checks.insert(sha(index), checks);
        self
    }

    pub fn with_failing_checks(mut self, index: usize) -> Self {
        self.failing_checks.insert(sha(index));
        self
    }

    pub fn with_log(mut self, run_id: &str, log: &str) -> Self {
        self.logs.insert(run_id.to_string(), log.to_string());
        self
    }
}

impl CodeHost for FakeHost {
    fn repo_url(&self) -> Result<String> {
        Ok("https://github.com/acme/widgets".to_string())
    }

    fn repo_name_with_owner(&self) -> Result<String> {
        Ok("acme/widgets".to_string())
    }

    fn commit_checks(&self, _repo: &str, commit: &str) -> Result<Vec<CheckResult>> {
        if self.failing_checks.contains(commit) {
            return Err(Error::HostCommandError("HTTP 502".to_string()));
        }
        Ok(self.checks.get(commit).cloned().unwrap_or_default())
    }

    fn run_log(&self, run_id: &str) -> Result<String> {
        self.log_requests.borrow_mut().push(run_id.to_string());
        self.logs
            .get(run_id)
            .cloned()
            .ok_or_else(|| Error::HostCommandError(format!("run {run_id} not found")))
    }
}

/// Layer recording the fields of every new span as `(name, debug value)` pairs.
#[derive(Clone, Default)]
pub struct SpanFields(Arc<Mutex<Vec<(String, String)>>>);

impl SpanFields {
    pub fn recorded(&self) -> Vec<(String, String)> {
        self.0.lock().expect("span fields lock").clone()
    }
}

struct FieldCollector<'a>(&'a Mutex<Vec<(String, String)>>);

impl Visit for FieldCollector<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .lock()
            .expect("span fields lock")
            .push((field.name().to_string(), format!("{value:?}")));
    }
}

impl<S: tracing::Subscriber> Layer<S> for SpanFields {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        attrs.record(&mut FieldCollector(&self.0));
    }
}
