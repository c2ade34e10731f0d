//! Working-tree classification.
//!
//! Compares three sources of truth — the current commit's snapshot, the
//! staging area, and the working-directory listing — and sorts every filename
//! into exactly one of four categories. The classifier is pure: the caller
//! supplies the working listing as filename → content-digest, so the logic is
//! testable without touching a filesystem.

use std::collections::{BTreeMap, BTreeSet};

use crate::stage::StagingArea;
use crate::types::{BranchName, Digest};

/// annotation suffixes for the modified-but-not-staged category
const MODIFIED_SUFFIX: &str = " (modified)";
const DELETED_SUFFIX: &str = " (deleted)";

/// The four disjoint working-tree categories, each lexicographically sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    /// filenames staged for addition
    pub staged: Vec<String>,
    /// filenames staged for removal
    pub removed: Vec<String>,
    /// filenames with unstaged changes, annotated " (modified)" or " (deleted)"
    pub modified: Vec<String>,
    /// filenames present in the working directory but unknown to the engine
    pub untracked: Vec<String>,
}

/// The full `status` report: branch listing plus the four categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// all branch names, sorted
    pub branches: Vec<BranchName>,
    /// the branch HEAD points at
    pub current_branch: BranchName,
    /// the working-tree categories
    pub tree: WorkingTreeStatus,
}

/// Classify every known filename against the current commit snapshot, the
/// staging area, and the working-directory listing.
pub fn classify(
    commit_map: &BTreeMap<String, Digest>,
    stage: &StagingArea,
    working: &BTreeMap<String, Digest>,
) -> WorkingTreeStatus {
    let additions = stage.additions();
    let removals = stage.removals();

    let staged: Vec<String> = additions.keys().cloned().collect();
    let removed: Vec<String> = removals.keys().cloned().collect();

    // modified but not staged, deduplicated and sorted via the set
    let mut modified = BTreeSet::new();

    // tracked, present, not staged for addition, content drifted
    for (file, tracked) in commit_map {
        if let Some(working_digest) = working.get(file) {
            if !additions.contains_key(file) && working_digest != tracked {
                modified.insert(format!("{}{}", file, MODIFIED_SUFFIX));
            }
        }
    }
    // staged for addition but the working copy drifted again
    for (file, staged_digest) in additions {
        match working.get(file) {
            Some(working_digest) if working_digest != staged_digest => {
                modified.insert(format!("{}{}", file, MODIFIED_SUFFIX));
            }
            // staged for addition, then deleted from the working directory
            None => {
                modified.insert(format!("{}{}", file, DELETED_SUFFIX));
            }
            _ => {}
        }
    }
    // tracked, not staged for removal, gone from the working directory
    for file in commit_map.keys() {
        if !removals.contains_key(file) && !working.contains_key(file) {
            modified.insert(format!("{}{}", file, DELETED_SUFFIX));
        }
    }

    // untracked: staged-for-removal but recreated, plus entirely unknown files
    let mut untracked = BTreeSet::new();
    for file in working.keys() {
        let recreated = removals.contains_key(file);
        let unknown = !commit_map.contains_key(file) && !additions.contains_key(file);
        if recreated || unknown {
            untracked.insert(file.clone());
        }
    }

    WorkingTreeStatus {
        staged,
        removed,
        modified: modified.into_iter().collect(),
        untracked: untracked.into_iter().collect(),
    }
}
