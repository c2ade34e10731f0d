//! Error types for the version-control engine
//!
//! All errors that can occur during repository operations are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages.

use thiserror::Error;

use crate::types::{Digest, InvalidNameError};

/// the main error type for repository operations
#[derive(Debug, Error)]
pub enum VcsError {
    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// the requested blob was not found in the object store
    #[error("object not found: {0}")]
    ObjectNotFound(Digest),

    /// the requested commit was not found
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// the specified branch was not found
    #[error("branch not found: {0}")]
    BranchNotFound(String),

    /// the file is not tracked by the referenced commit
    #[error("file does not exist in that commit: {0}")]
    FileNotInCommit(String),

    /// invalid branch name
    #[error("invalid branch name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// an abbreviated digest matched more than one stored object
    #[error("ambiguous prefix '{prefix}': {matches} objects match")]
    AmbiguousPrefix { prefix: String, matches: usize },

    /// commit was attempted with a blank message
    #[error("please enter a commit message")]
    EmptyMessage,

    /// commit was attempted with an empty staging area
    #[error("no changes added to the commit")]
    NoChangesStaged,

    /// removal was requested for a file that is neither staged nor tracked
    #[error("no reason to remove the file: {0}")]
    NothingToRemove(String),

    /// branch already exists
    #[error("a branch with that name already exists: {0}")]
    BranchAlreadyExists(String),

    /// checkout or merge targeted the branch that is already active
    #[error("operation targets the current branch: {0}")]
    SelfOperation(String),

    /// an untracked working file would be overwritten
    #[error("untracked file in the way: {0}")]
    UntrackedConflict(String),

    /// merge target is already an ancestor of the current branch
    #[error("given branch is an ancestor of the current branch")]
    AlreadyAncestor,

    /// current branch was an ancestor of the target; the checkout was performed
    #[error("current branch fast-forwarded")]
    FastForwarded,

    /// repository already exists at this root
    #[error("a repository already exists in {}", .0.display())]
    AlreadyInitialized(std::path::PathBuf),

    /// repo is not initialized
    #[error("repository not initialized: {}", .0.display())]
    NotInitialized(std::path::PathBuf),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl VcsError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VcsError::ObjectNotFound(_)
                | VcsError::CommitNotFound(_)
                | VcsError::BranchNotFound(_)
                | VcsError::FileNotInCommit(_)
        )
    }

    /// check if this error is a merge shortcut rather than a real failure
    pub fn is_merge_shortcut(&self) -> bool {
        matches!(self, VcsError::AlreadyAncestor | VcsError::FastForwarded)
    }

    /// check if this error is a precondition violation the caller can fix
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            VcsError::EmptyMessage
                | VcsError::NoChangesStaged
                | VcsError::NothingToRemove(_)
                | VcsError::BranchAlreadyExists(_)
                | VcsError::SelfOperation(_)
                | VcsError::UntrackedConflict(_)
        )
    }
}

/// result type alias for repository operations
pub type VcsResult<T> = Result<T, VcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = VcsError::BranchNotFound("feature".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_merge_shortcut());

        let shortcut = VcsError::FastForwarded;
        assert!(shortcut.is_merge_shortcut());
        assert!(!shortcut.is_not_found());

        let precondition = VcsError::NoChangesStaged;
        assert!(precondition.is_precondition());
        assert!(!precondition.is_not_found());
    }
}
