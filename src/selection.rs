use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, instrument};

use crate::git::Git;

/// Selections up to this size are listed in full inside report headers.
const FULL_HEADER_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Invalid commit selection: empty input. Expected format like 'abc123,def456' or 'abc123-def456'.")]
    EmptyInput,

    #[error("Invalid commit selection segment '{segment}' in '{input}'. Expected format like 'abc123,def456' or 'abc123-def456'.")]
    EmptySegment { segment: String, input: String },

    #[error("Invalid commit selection segment '{segment}' in '{input}'. Expected format like 'abc123,def456' or 'abc123-def456'.")]
    MalformedSegment { segment: String, input: String },

    #[error("Invalid commit range '{segment}' in '{input}'. Expected format like 'abc123-def456'.")]
    InvalidRange { segment: String, input: String },

    #[error("Invalid commit token '{token}': {reason}")]
    UnresolvableRef { token: String, reason: String },

    #[error("Invalid commit range '{segment}': '{start}' is not an ancestor of '{end}'.")]
    NotAncestor {
        segment: String,
        start: String,
        end: String,
    },

    #[error("Invalid commit selection '{input}': no commits parsed. Expected format like 'abc123,def456' or 'abc123-def456'.")]
    NoCommits { input: String },
}

type SelectionResult<T> = std::result::Result<T, SelectionError>;

fn is_full_sha(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Resolves a single reference to a verified 40 character commit id.
///
/// # Errors
///
/// Fails when the reference is blank, unknown to the repository, or resolves
/// to anything other than a full hexadecimal SHA.
pub fn resolve_commit(git: &impl Git, reference: &str) -> SelectionResult<String> {
    let cleaned = reference.trim();
    if cleaned.is_empty() {
        return Err(SelectionError::UnresolvableRef {
            token: reference.to_string(),
            reason: "empty ref".to_string(),
        });
    }

    let sha = git
        .resolve_ref(cleaned)
        .map_err(|e| SelectionError::UnresolvableRef {
            token: reference.to_string(),
            reason: e.to_string(),
        })?;

    if !is_full_sha(&sha) {
        return Err(SelectionError::UnresolvableRef {
            token: reference.to_string(),
            reason: format!("resolved to '{sha}'"),
        });
    }
    Ok(sha)
}

/// Insertion-ordered set of commit ids.
#[derive(Default)]
struct OrderedCommits {
    commits: Vec<String>,
    seen: HashSet<String>,
}

impl OrderedCommits {
    fn push(&mut self, commit: String) {
        if !commit.is_empty() && self.seen.insert(commit.clone()) {
            self.commits.push(commit);
        }
    }
}

/// Parses a selection such as `abc123,def456` or `abc123-def456` into an
/// ordered list of unique, verified commit ids.
///
/// Segments are separated by commas; whitespace inside a segment is ignored.
/// A segment is either a single reference or a `start-end` range where
/// `start` must be an ancestor of `end`. Ranges expand to `start` followed by
/// every commit on the first-parent path up to `end`, oldest first. The first
/// occurrence of a commit wins across the whole selection.
///
/// # Errors
///
/// Returns a [`SelectionError`] describing the offending segment or token.
#[instrument(skip(git))]
pub fn parse_commit_selection(git: &impl Git, input: &str) -> SelectionResult<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SelectionError::EmptyInput);
    }

    let mut selected = OrderedCommits::default();

    for segment in trimmed.split(',').map(str::trim) {
        let cleaned: String = segment.chars().filter(|c| !c.is_whitespace()).collect();
        if cleaned.is_empty() {
            return Err(SelectionError::EmptySegment {
                segment: segment.to_string(),
                input: input.to_string(),
            });
        }

        let parts: Vec<&str> = cleaned.split('-').collect();
        match parts.as_slice() {
            [single] => selected.push(resolve_commit(git, single)?),
            [start_ref, end_ref] => {
                if start_ref.is_empty() || end_ref.is_empty() {
                    return Err(SelectionError::InvalidRange {
                        segment: segment.to_string(),
                        input: input.to_string(),
                    });
                }
                let start = resolve_commit(git, start_ref)?;
                let end = resolve_commit(git, end_ref)?;

                let not_ancestor = || SelectionError::NotAncestor {
                    segment: segment.to_string(),
                    start: start.clone(),
                    end: end.clone(),
                };
                if !git.is_ancestor(&start, &end).map_err(|_| not_ancestor())? {
                    return Err(not_ancestor());
                }

                if start == end {
                    selected.push(start);
                    continue;
                }

                let range = git.list_commits_in_range(&start, &end).map_err(|e| {
                    SelectionError::UnresolvableRef {
                        token: segment.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                debug!(segment, range_len = range.len(), "Range expanded");
                selected.push(start);
                for commit in range {
                    selected.push(commit);
                }
            }
            _ => {
                return Err(SelectionError::MalformedSegment {
                    segment: segment.to_string(),
                    input: input.to_string(),
                })
            }
        }
    }

    if selected.commits.is_empty() {
        return Err(SelectionError::NoCommits {
            input: input.to_string(),
        });
    }
    Ok(selected.commits)
}

/// Formats commit ids into the canonical selection string.
#[must_use]
pub fn format_commit_selection(commits: &[String]) -> String {
    commits.join(",")
}

fn short(commit: &str) -> &str {
    commit.get(..8).unwrap_or(commit)
}

/// Short tag identifying a selection in file names:
/// `<first>-<last>-<count>commits-<hash>`.
#[must_use]
pub fn build_selection_tag(commits: &[String], canonical: &str) -> String {
    let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
    let hash = &digest[..8];
    match (commits.first(), commits.last()) {
        (Some(first), Some(last)) => format!(
            "{}-{}-{}commits-{hash}",
            short(first),
            short(last),
            commits.len()
        ),
        _ => format!("0commits-{hash}"),
    }
}

/// Comma separated short ids, eliding the middle of long lists.
#[must_use]
pub fn format_commit_list_preview(commits: &[String], max_items: usize, edge_items: usize) -> String {
    let join = |items: &[String]| {
        items
            .iter()
            .map(|c| short(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if commits.len() <= max_items {
        return join(commits);
    }
    let edge = edge_items.min(commits.len());
    format!(
        "{} ... {}",
        join(&commits[..edge]),
        join(&commits[commits.len() - edge..])
    )
}

/// A parsed commit selection together with the text the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub requested: String,
    pub commits: Vec<String>,
}

impl Selection {
    /// Parses `requested` against the repository.
    ///
    /// # Errors
    ///
    /// See [`parse_commit_selection`].
    pub fn parse(git: &impl Git, requested: &str) -> SelectionResult<Self> {
        Ok(Self {
            requested: requested.to_string(),
            commits: parse_commit_selection(git, requested)?,
        })
    }

    #[must_use]
    pub fn canonical(&self) -> String {
        format_commit_selection(&self.commits)
    }

    #[must_use]
    pub fn tag(&self) -> String {
        build_selection_tag(&self.commits, &self.canonical())
    }

    #[must_use]
    pub fn preview(&self) -> String {
        format_commit_list_preview(&self.commits, 10, 3)
    }

    /// Provenance lines written at the top of every aggregate report.
    #[must_use]
    pub fn header_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("# Commit selection (requested): {}", self.requested),
            format!("# Commit selection (canonical): {}", self.canonical()),
        ];
        let count = self.commits.len();
        match (self.commits.first(), self.commits.last()) {
            (Some(_), Some(_)) if count <= FULL_HEADER_LIMIT => {
                let expanded = format_commit_list_preview(&self.commits, count, 0);
                lines.push(format!("# Expanded commits (count={count}): {expanded}"));
            }
            (Some(first), Some(last)) => lines.push(format!(
                "# Expanded commits: count={count} min={} max={} preview={}",
                short(first),
                short(last),
                self.preview()
            )),
            _ => lines.push("# Expanded commits: count=0".to_string()),
        }
        lines
    }
}
