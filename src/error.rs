use crate::selection::SelectionError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Git command failed: {0}")]
    GitCommandError(String),

    #[error("Host command failed: {0}")]
    HostCommandError(String),

    #[error("Failed to parse host response: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Lookup failed for commit {commit}: {message}")]
    Lookup { commit: String, message: String },

    #[error("Currently on branch '{actual}'. This tool requires starting from '{expected}' branch.")]
    BranchMismatch { expected: String, actual: String },

    #[error("No valid commits found for the requested selection")]
    NoValidCommits,

    #[error("Interrupted by user")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, Error>;
