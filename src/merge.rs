//! Three-way merge machinery: split-point search and per-file reconciliation.
//!
//! The split point is the nearest common ancestor of the two branch tips,
//! found with a depth-indexed search: each tip's full ancestor set is walked
//! breadth-first recording minimal depths, the sets are intersected, and the
//! candidate with the smallest summed depth wins, ties broken by digest
//! order. A plain FIFO interleaving of the two walks can return a non-nearest
//! ancestor in histories with multiple merge points, which is why the depths
//! are tracked explicitly.
//!
//! Per-file reconciliation is a closed classification: each filename in the
//! union of the three snapshots maps to exactly one `MergeCase`, and each
//! case maps to one `MergeAction`. "Modified" always means relative to the
//! split point; a file absent from a side counts as modified if the split
//! point had it.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::commit::Commit;
use crate::error::{VcsError, VcsResult};
use crate::object::ObjectStore;
use crate::types::Digest;

/// Find the split point: the nearest common ancestor of `a` and `b`.
///
/// `find_split_point(x, x) = x`, and on a linear chain the older commit of
/// the pair is returned. Errors only if the two tips share no ancestor,
/// which cannot happen while every commit descends from the single root.
pub fn find_split_point(store: &ObjectStore, a: &Digest, b: &Digest) -> VcsResult<Digest> {
    let depths_a = ancestor_depths(store, a)?;
    let depths_b = ancestor_depths(store, b)?;

    let mut best: Option<(u64, Digest)> = None;
    for (digest, depth_a) in &depths_a {
        if let Some(depth_b) = depths_b.get(digest) {
            let sum = depth_a + depth_b;
            let candidate = (sum, digest.clone());
            match &best {
                Some(current) if *current <= candidate => {}
                _ => best = Some(candidate),
            }
        }
    }

    match best {
        Some((depth, digest)) => {
            debug!(split = %digest.short(), depth, "found split point");
            Ok(digest)
        }
        None => Err(VcsError::Internal(format!(
            "no common ancestor between {} and {}",
            a.short(),
            b.short()
        ))),
    }
}

/// Every ancestor of `tip` (both parents of merges included) with its
/// minimal distance from the tip. Breadth-first, so the first visit of a
/// digest is already at minimal depth.
fn ancestor_depths(store: &ObjectStore, tip: &Digest) -> VcsResult<HashMap<Digest, u64>> {
    let mut depths: HashMap<Digest, u64> = HashMap::new();
    let mut queue: VecDeque<(Digest, u64)> = VecDeque::new();
    queue.push_back((tip.clone(), 0));

    while let Some((digest, depth)) = queue.pop_front() {
        if depths.contains_key(&digest) {
            continue;
        }
        let commit = Commit::load(store, &digest)?;
        depths.insert(digest, depth);
        for parent in commit.parents() {
            if !depths.contains_key(&parent) {
                queue.push_back((parent, depth + 1));
            }
        }
    }
    Ok(depths)
}

/// How one filename relates to the split point on each side of the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeCase {
    /// identical in all three snapshots
    Unchanged,
    /// changed only on the current side
    OnlyCurrentModified,
    /// changed only on the other side, still present there
    OnlyOtherModified,
    /// both sides changed it to the same result (or both deleted it)
    BothModifiedSame,
    /// both sides changed it to different results
    BothModifiedDiffer,
    /// not at the split point; created only on the current side
    AddedOnlyInCurrent,
    /// not at the split point; created only on the other side
    AddedOnlyInOther,
    /// not at the split point; created independently on both sides
    AddedInBoth,
    /// untouched on the current side, deleted on the other
    DeletedInOtherOnly,
    /// deleted on the current side, untouched on the other
    DeletedInCurrentOnly,
}

/// The action a `MergeCase` dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// keep the current side's state, whatever it is
    Keep,
    /// overwrite the working file with the other side's content and stage it
    TakeOther,
    /// stage the file for removal and delete the working copy
    Remove,
    /// write conflict-marker content, stage it, report the conflict
    Conflict,
}

impl MergeCase {
    /// the action this case dispatches to
    pub fn action(self) -> MergeAction {
        match self {
            MergeCase::OnlyOtherModified | MergeCase::AddedOnlyInOther => MergeAction::TakeOther,
            MergeCase::DeletedInOtherOnly => MergeAction::Remove,
            MergeCase::BothModifiedDiffer => MergeAction::Conflict,
            MergeCase::Unchanged
            | MergeCase::OnlyCurrentModified
            | MergeCase::BothModifiedSame
            | MergeCase::AddedOnlyInCurrent
            | MergeCase::AddedInBoth
            | MergeCase::DeletedInCurrentOnly => MergeAction::Keep,
        }
    }
}

/// Classify one filename given its blob digest (or absence) at the split
/// point and on each side.
pub fn classify(
    split: Option<&Digest>,
    current: Option<&Digest>,
    other: Option<&Digest>,
) -> MergeCase {
    match split {
        Some(base) => {
            let current_modified = current != Some(base);
            let other_modified = other != Some(base);
            match (current_modified, other_modified) {
                (false, false) => MergeCase::Unchanged,
                (true, false) => match current {
                    Some(_) => MergeCase::OnlyCurrentModified,
                    None => MergeCase::DeletedInCurrentOnly,
                },
                (false, true) => match other {
                    Some(_) => MergeCase::OnlyOtherModified,
                    None => MergeCase::DeletedInOtherOnly,
                },
                (true, true) => {
                    if current == other {
                        MergeCase::BothModifiedSame
                    } else {
                        MergeCase::BothModifiedDiffer
                    }
                }
            }
        }
        None => match (current, other) {
            (Some(_), None) => MergeCase::AddedOnlyInCurrent,
            (None, Some(_)) => MergeCase::AddedOnlyInOther,
            (Some(c), Some(o)) => {
                if c == o {
                    MergeCase::Unchanged
                } else {
                    MergeCase::AddedInBoth
                }
            }
            // the filename union guarantees at least one side has it
            (None, None) => MergeCase::Unchanged,
        },
    }
}

/// Build the literal conflict-marker content for one file, substituting the
/// empty string for a side where the file is absent.
pub fn conflict_content(current: Option<&[u8]>, other: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(current.unwrap_or_default());
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(other.unwrap_or_default());
    out.extend_from_slice(b">>>>>>>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::create(dir.path()).unwrap();
        (dir, store)
    }

    fn child(store: &ObjectStore, message: &str, parent: &Digest) -> Digest {
        Commit::new(message, BTreeMap::new(), parent.clone(), None)
            .store(store)
            .unwrap()
    }

    fn merge_commit(store: &ObjectStore, message: &str, p1: &Digest, p2: &Digest) -> Digest {
        Commit::new(message, BTreeMap::new(), p1.clone(), Some(p2.clone()))
            .store(store)
            .unwrap()
    }

    fn digest(s: &str) -> Digest {
        Digest::of_bytes(s.as_bytes())
    }

    #[test]
    fn test_split_point_of_commit_with_itself() {
        let (_dir, store) = setup();
        let root = Commit::root().store(&store).unwrap();
        let tip = child(&store, "one", &root);

        assert_eq!(find_split_point(&store, &tip, &tip).unwrap(), tip);
    }

    #[test]
    fn test_split_point_on_linear_chain_is_ancestor() {
        let (_dir, store) = setup();
        let root = Commit::root().store(&store).unwrap();
        let older = child(&store, "older", &root);
        let newer = child(&store, "newer", &older);

        assert_eq!(find_split_point(&store, &older, &newer).unwrap(), older);
        assert_eq!(find_split_point(&store, &newer, &older).unwrap(), older);
    }

    #[test]
    fn test_split_point_of_diverged_branches() {
        let (_dir, store) = setup();
        let root = Commit::root().store(&store).unwrap();
        let fork = child(&store, "fork", &root);
        let left = child(&store, "left", &fork);
        let right = child(&store, "right", &fork);

        assert_eq!(find_split_point(&store, &left, &right).unwrap(), fork);
    }

    #[test]
    fn test_split_point_through_merge_commit_is_nearest() {
        // root -> c1, root -> c2, m = merge(c1, c2); b continues from c2.
        // The nearest common ancestor of m and b is c2, not root.
        let (_dir, store) = setup();
        let root = Commit::root().store(&store).unwrap();
        let c1 = child(&store, "c1", &root);
        let c2 = child(&store, "c2", &root);
        let m = merge_commit(&store, "m", &c1, &c2);
        let b = child(&store, "b", &c2);

        assert_eq!(find_split_point(&store, &m, &b).unwrap(), c2);
    }

    #[test]
    fn test_split_point_criss_cross_tie_breaks_by_digest() {
        // a and b are both parents of both merge tips, at equal summed
        // depth. The winner must be deterministic: the smaller digest.
        let (_dir, store) = setup();
        let root = Commit::root().store(&store).unwrap();
        let a = child(&store, "a", &root);
        let b = child(&store, "b", &root);
        let m1 = merge_commit(&store, "m1", &a, &b);
        let m2 = merge_commit(&store, "m2", &b, &a);

        let expected = a.clone().min(b.clone());
        assert_eq!(find_split_point(&store, &m1, &m2).unwrap(), expected);
        assert_eq!(find_split_point(&store, &m2, &m1).unwrap(), expected);
    }

    #[test]
    fn test_classify_unchanged() {
        let d = digest("same");
        let case = classify(Some(&d), Some(&d), Some(&d));
        assert_eq!(case, MergeCase::Unchanged);
        assert_eq!(case.action(), MergeAction::Keep);
    }

    #[test]
    fn test_classify_only_current_modified() {
        let base = digest("base");
        let ours = digest("ours");
        let case = classify(Some(&base), Some(&ours), Some(&base));
        assert_eq!(case, MergeCase::OnlyCurrentModified);
        assert_eq!(case.action(), MergeAction::Keep);
    }

    #[test]
    fn test_classify_only_other_modified() {
        let base = digest("base");
        let theirs = digest("theirs");
        let case = classify(Some(&base), Some(&base), Some(&theirs));
        assert_eq!(case, MergeCase::OnlyOtherModified);
        assert_eq!(case.action(), MergeAction::TakeOther);
    }

    #[test]
    fn test_classify_both_modified_same() {
        let base = digest("base");
        let both = digest("both");
        let case = classify(Some(&base), Some(&both), Some(&both));
        assert_eq!(case, MergeCase::BothModifiedSame);
        assert_eq!(case.action(), MergeAction::Keep);

        // both deleted counts as the same result
        let case = classify(Some(&base), None, None);
        assert_eq!(case, MergeCase::BothModifiedSame);
    }

    #[test]
    fn test_classify_both_modified_differ() {
        let base = digest("base");
        let ours = digest("ours");
        let theirs = digest("theirs");
        let case = classify(Some(&base), Some(&ours), Some(&theirs));
        assert_eq!(case, MergeCase::BothModifiedDiffer);
        assert_eq!(case.action(), MergeAction::Conflict);

        // modified on one side, deleted on the other, also conflicts
        let case = classify(Some(&base), Some(&ours), None);
        assert_eq!(case, MergeCase::BothModifiedDiffer);
        let case = classify(Some(&base), None, Some(&theirs));
        assert_eq!(case, MergeCase::BothModifiedDiffer);
    }

    #[test]
    fn test_classify_added_only_in_current() {
        let ours = digest("ours");
        let case = classify(None, Some(&ours), None);
        assert_eq!(case, MergeCase::AddedOnlyInCurrent);
        assert_eq!(case.action(), MergeAction::Keep);
    }

    #[test]
    fn test_classify_added_only_in_other() {
        let theirs = digest("theirs");
        let case = classify(None, None, Some(&theirs));
        assert_eq!(case, MergeCase::AddedOnlyInOther);
        assert_eq!(case.action(), MergeAction::TakeOther);
    }

    #[test]
    fn test_classify_added_in_both() {
        let ours = digest("ours");
        let theirs = digest("theirs");
        let case = classify(None, Some(&ours), Some(&theirs));
        assert_eq!(case, MergeCase::AddedInBoth);
        assert_eq!(case.action(), MergeAction::Keep);

        // independently created with identical content is just unchanged
        let case = classify(None, Some(&ours), Some(&ours));
        assert_eq!(case, MergeCase::Unchanged);
    }

    #[test]
    fn test_classify_deleted_in_other_only() {
        let base = digest("base");
        let case = classify(Some(&base), Some(&base), None);
        assert_eq!(case, MergeCase::DeletedInOtherOnly);
        assert_eq!(case.action(), MergeAction::Remove);
    }

    #[test]
    fn test_classify_deleted_in_current_only() {
        let base = digest("base");
        let case = classify(Some(&base), None, Some(&base));
        assert_eq!(case, MergeCase::DeletedInCurrentOnly);
        assert_eq!(case.action(), MergeAction::Keep);
    }

    #[test]
    fn test_conflict_content_verbatim() {
        let content = conflict_content(Some(b"current\n"), Some(b"other\n"));
        assert_eq!(
            content,
            b"<<<<<<< HEAD\ncurrent\n=======\nother\n>>>>>>>\n"
        );
    }

    #[test]
    fn test_conflict_content_absent_side_is_empty() {
        let content = conflict_content(None, Some(b"other\n"));
        assert_eq!(content, b"<<<<<<< HEAD\n=======\nother\n>>>>>>>\n");

        let content = conflict_content(Some(b"current\n"), None);
        assert_eq!(content, b"<<<<<<< HEAD\ncurrent\n=======\n>>>>>>>\n");
    }
}
