//! Commit records and history traversal.
//!
//! Commits are the immutable nodes of the repository's history graph. A
//! commit's identity is the digest of its canonical serialization: the field
//! order is fixed by the struct definition and the file map is a `BTreeMap`,
//! so logically identical metadata always produces identical bytes and
//! therefore an identical digest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VcsResult;
use crate::object::ObjectStore;
use crate::types::Digest;

/// message of the deterministic root commit shared by all fresh repositories
pub const ROOT_MESSAGE: &str = "initial commit";

/// An immutable commit record.
///
/// A commit has zero parents (the root), one parent (an ordinary commit), or
/// two parents (a merge result). It is never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    message: String,
    timestamp: DateTime<Utc>,
    file_map: BTreeMap<String, Digest>,
    parent: Option<Digest>,
    second_parent: Option<Digest>,
}

impl Commit {
    /// The root commit: fixed message, epoch timestamp, empty file map, no
    /// parents. Every fresh repository starts from the same digest.
    pub fn root() -> Self {
        Self {
            message: ROOT_MESSAGE.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            file_map: BTreeMap::new(),
            parent: None,
            second_parent: None,
        }
    }

    /// Create an ordinary or merge commit, timestamped now.
    pub fn new(
        message: impl Into<String>,
        file_map: BTreeMap<String, Digest>,
        parent: Digest,
        second_parent: Option<Digest>,
    ) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            file_map,
            parent: Some(parent),
            second_parent,
        }
    }

    /// the commit message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    /// when the commit was created
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// the filename-to-blob-digest snapshot this commit records
    pub fn file_map(&self) -> &BTreeMap<String, Digest> {
        &self.file_map
    }

    /// a copy of the snapshot, as the starting point for a child commit
    pub fn file_map_copy(&self) -> BTreeMap<String, Digest> {
        self.file_map.clone()
    }

    /// the blob digest tracked for a file, if any
    pub fn tracked(&self, file: &str) -> Option<&Digest> {
        self.file_map.get(file)
    }

    /// whether this commit tracks the given file
    pub fn tracks(&self, file: &str) -> bool {
        self.file_map.contains_key(file)
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<&Digest> {
        self.parent.as_ref()
    }

    /// check if this is a merge commit (has two parents)
    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// check if this is the parentless root commit
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Adjacency: the ordered parent digests present (0, 1, or 2 entries).
    /// The first element is always the primary parent.
    pub fn parents(&self) -> Vec<Digest> {
        let mut out = Vec::with_capacity(2);
        if let Some(p) = &self.parent {
            out.push(p.clone());
        }
        if let Some(p) = &self.second_parent {
            out.push(p.clone());
        }
        out
    }

    /// the canonical serialized form whose digest identifies this commit
    pub fn canonical_bytes(&self) -> VcsResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// the content digest of this commit
    pub fn digest(&self) -> VcsResult<Digest> {
        Ok(Digest::of_bytes(&self.canonical_bytes()?))
    }

    /// Persist this commit into the object store, returning its digest.
    pub fn store(&self, store: &ObjectStore) -> VcsResult<Digest> {
        store.store_commit_bytes(&self.canonical_bytes()?)
    }

    /// Load a commit from the object store by digest.
    pub fn load(store: &ObjectStore, digest: &Digest) -> VcsResult<Self> {
        let bytes = store.load_commit_bytes(digest)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Iterator over the first-parent chain from a starting commit to the root.
///
/// Yields each commit once, newest first, and terminates at the parentless
/// root commit. Second parents of merge commits are not followed.
pub struct History<'a> {
    store: &'a ObjectStore,
    next: Option<Digest>,
}

impl<'a> History<'a> {
    /// start walking from the given commit digest
    pub fn from(store: &'a ObjectStore, start: Digest) -> Self {
        Self {
            store,
            next: Some(start),
        }
    }
}

impl Iterator for History<'_> {
    type Item = VcsResult<(Digest, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let digest = self.next.take()?;
        match Commit::load(self.store, &digest) {
            Ok(commit) => {
                self.next = commit.first_parent().cloned();
                Some(Ok((digest, commit)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::create(dir.path()).unwrap();
        (dir, store)
    }

    fn map_of(entries: &[(&str, &[u8])]) -> BTreeMap<String, Digest> {
        entries
            .iter()
            .map(|(name, bytes)| (name.to_string(), Digest::of_bytes(bytes)))
            .collect()
    }

    #[test]
    fn test_root_commit_deterministic() {
        // two fresh roots are byte-identical, so they share a digest
        let a = Commit::root();
        let b = Commit::root();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert!(a.is_root());
        assert!(!a.is_merge());
        assert!(a.parents().is_empty());
        assert_eq!(a.message(), ROOT_MESSAGE);
    }

    #[test]
    fn test_digest_changes_with_any_field() {
        let root = Commit::root();
        let root_digest = root.digest().unwrap();

        let mut other = Commit::root();
        other.message = "different".to_string();
        assert_ne!(other.digest().unwrap(), root_digest);

        let mut other = Commit::root();
        other.timestamp = Utc::now();
        assert_ne!(other.digest().unwrap(), root_digest);

        let mut other = Commit::root();
        other.file_map = map_of(&[("a.txt", b"v1")]);
        assert_ne!(other.digest().unwrap(), root_digest);

        let mut other = Commit::root();
        other.parent = Some(root_digest.clone());
        assert_ne!(other.digest().unwrap(), root_digest);
    }

    #[test]
    fn test_identical_fields_identical_digest() {
        let ts = Utc::now();
        let parent = Commit::root().digest().unwrap();
        let mut a = Commit::new("msg", map_of(&[("f", b"x")]), parent.clone(), None);
        let mut b = Commit::new("msg", map_of(&[("f", b"x")]), parent, None);
        a.timestamp = ts;
        b.timestamp = ts;
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let (_dir, store) = setup();

        let root = Commit::root();
        let digest = root.store(&store).unwrap();
        assert_eq!(digest, root.digest().unwrap());

        let loaded = Commit::load(&store, &digest).unwrap();
        assert_eq!(loaded, root);
    }

    #[test]
    fn test_parents_ordering() {
        let first = Digest::of_bytes(b"first parent");
        let second = Digest::of_bytes(b"second parent");
        let commit = Commit::new("merge", BTreeMap::new(), first.clone(), Some(second.clone()));

        assert!(commit.is_merge());
        assert_eq!(commit.parents(), vec![first.clone(), second]);
        assert_eq!(commit.first_parent(), Some(&first));
    }

    #[test]
    fn test_history_walks_first_parent_to_root() {
        let (_dir, store) = setup();

        let root = Commit::root();
        let root_digest = root.store(&store).unwrap();

        let c1 = Commit::new("one", BTreeMap::new(), root_digest.clone(), None);
        let c1_digest = c1.store(&store).unwrap();

        let c2 = Commit::new("two", BTreeMap::new(), c1_digest.clone(), None);
        let c2_digest = c2.store(&store).unwrap();

        let entries: Vec<_> = History::from(&store, c2_digest.clone())
            .collect::<VcsResult<Vec<_>>>()
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, c2_digest);
        assert_eq!(entries[1].0, c1_digest);
        assert_eq!(entries[2].0, root_digest);
        assert_eq!(entries[0].1.message(), "two");
        assert_eq!(entries[2].1.message(), ROOT_MESSAGE);
    }

    #[test]
    fn test_history_skips_second_parent() {
        let (_dir, store) = setup();

        let root_digest = Commit::root().store(&store).unwrap();
        let side = Commit::new("side", BTreeMap::new(), root_digest.clone(), None);
        let side_digest = side.store(&store).unwrap();
        let merge = Commit::new("merge", BTreeMap::new(), root_digest.clone(), Some(side_digest));
        let merge_digest = merge.store(&store).unwrap();

        let entries: Vec<_> = History::from(&store, merge_digest)
            .collect::<VcsResult<Vec<_>>>()
            .unwrap();

        // merge -> root, never through the side branch
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].0, root_digest);
    }
}
