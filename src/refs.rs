//! Branch and HEAD reference management.
//!
//! Refs are the only mutable pieces of repository state besides the staging
//! area: each branch file holds the digest of its tip commit, and `HEAD`
//! holds the *name* of the active branch, never a commit digest directly.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{VcsError, VcsResult};
use crate::types::{BranchName, Digest};

const BRANCHES_DIR: &str = "branches";
const HEAD_FILE: &str = "HEAD";

/// Manages the branch-name → commit-digest table and the HEAD pointer.
#[derive(Debug, Clone)]
pub struct RefStore {
    branches_dir: PathBuf,
    head_file: PathBuf,
}

impl RefStore {
    /// wrap an existing repository directory
    pub(crate) fn open(vcs_dir: &Path) -> Self {
        Self {
            branches_dir: vcs_dir.join(BRANCHES_DIR),
            head_file: vcs_dir.join(HEAD_FILE),
        }
    }

    /// create the refs layout and wrap it
    pub(crate) fn create(vcs_dir: &Path) -> VcsResult<Self> {
        let store = Self::open(vcs_dir);
        fs::create_dir_all(&store.branches_dir)?;
        Ok(store)
    }

    fn branch_path(&self, branch: &BranchName) -> PathBuf {
        self.branches_dir.join(branch.as_str())
    }

    /// The name of the currently active branch.
    pub fn head_branch(&self) -> VcsResult<BranchName> {
        let name = fs::read_to_string(&self.head_file)?;
        Ok(BranchName::new(name.trim())?)
    }

    /// Point HEAD at the given branch name.
    pub fn set_head(&self, branch: &BranchName) -> VcsResult<()> {
        fs::write(&self.head_file, branch.as_str())?;
        debug!(branch = %branch, "moved HEAD");
        Ok(())
    }

    /// Resolve a branch name to its tip commit digest.
    pub fn resolve(&self, branch: &BranchName) -> VcsResult<Digest> {
        let path = self.branch_path(branch);
        if !path.exists() {
            return Err(VcsError::BranchNotFound(branch.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(Digest::from_hex_unchecked(content.trim()))
    }

    /// Resolve the tip of the active branch.
    pub fn head_commit(&self) -> VcsResult<Digest> {
        self.resolve(&self.head_branch()?)
    }

    /// Check if a branch exists.
    pub fn branch_exists(&self, branch: &BranchName) -> bool {
        self.branch_path(branch).exists()
    }

    /// Create a new branch pointing at the given commit.
    pub fn create_branch(&self, branch: &BranchName, target: &Digest) -> VcsResult<()> {
        if self.branch_exists(branch) {
            return Err(VcsError::BranchAlreadyExists(branch.to_string()));
        }
        fs::write(self.branch_path(branch), target.as_str())?;
        debug!(branch = %branch, target = %target.short(), "created branch");
        Ok(())
    }

    /// Move an existing branch to a new tip commit.
    pub fn update_branch(&self, branch: &BranchName, target: &Digest) -> VcsResult<()> {
        if !self.branch_exists(branch) {
            return Err(VcsError::BranchNotFound(branch.to_string()));
        }
        fs::write(self.branch_path(branch), target.as_str())?;
        debug!(branch = %branch, target = %target.short(), "moved branch");
        Ok(())
    }

    /// Delete a branch pointer. The commits it referenced stay in the store.
    pub fn delete_branch(&self, branch: &BranchName) -> VcsResult<()> {
        let path = self.branch_path(branch);
        if !path.exists() {
            return Err(VcsError::BranchNotFound(branch.to_string()));
        }
        fs::remove_file(path)?;
        debug!(branch = %branch, "deleted branch");
        Ok(())
    }

    /// List all branch names, lexicographically sorted.
    pub fn list_branches(&self) -> VcsResult<Vec<BranchName>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.branches_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(BranchName::new(name)?);
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }
}
