//! Content-addressed object persistence.
//!
//! Objects are write-once: the storage path is derived from the digest of the
//! content, so writing the same bytes twice lands on the same path with the
//! same contents. There is no update or delete. Commits and blobs live in
//! separate directories so that digest-prefix resolution only ever scans
//! commits.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::{VcsError, VcsResult};
use crate::types::Digest;

/// names of the two object directories under `objects/`
const BLOBS_DIR: &str = "blobs";
const COMMITS_DIR: &str = "commits";

/// The content-addressed object store.
///
/// Holds raw file snapshots (blobs) and serialized commit records, both keyed
/// by the SHA-256 digest of their bytes.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    blobs_dir: PathBuf,
    commits_dir: PathBuf,
}

impl ObjectStore {
    /// wrap an existing `objects/` directory
    pub(crate) fn open(objects_dir: &Path) -> Self {
        Self {
            blobs_dir: objects_dir.join(BLOBS_DIR),
            commits_dir: objects_dir.join(COMMITS_DIR),
        }
    }

    /// create the `objects/` layout and wrap it
    pub(crate) fn create(objects_dir: &Path) -> VcsResult<Self> {
        let store = Self::open(objects_dir);
        fs::create_dir_all(&store.blobs_dir)?;
        fs::create_dir_all(&store.commits_dir)?;
        Ok(store)
    }

    // ==================== Blobs ====================

    /// Store a file snapshot, returning its digest.
    ///
    /// Idempotent: storing identical content twice is a no-op that produces
    /// the same digest.
    pub fn store_blob(&self, bytes: &[u8]) -> VcsResult<Digest> {
        let digest = Digest::of_bytes(bytes);
        let path = self.blobs_dir.join(digest.as_str());
        if !path.exists() {
            fs::write(&path, bytes)?;
            trace!(digest = %digest.short(), len = bytes.len(), "stored blob");
        }
        Ok(digest)
    }

    /// Load a file snapshot by digest.
    pub fn load_blob(&self, digest: &Digest) -> VcsResult<Vec<u8>> {
        let path = self.blobs_dir.join(digest.as_str());
        if !path.exists() {
            return Err(VcsError::ObjectNotFound(digest.clone()));
        }
        Ok(fs::read(path)?)
    }

    /// Check whether a blob is present.
    pub fn blob_exists(&self, digest: &Digest) -> bool {
        self.blobs_dir.join(digest.as_str()).exists()
    }

    // ==================== Commits ====================

    /// Store a serialized commit record, returning its digest.
    pub(crate) fn store_commit_bytes(&self, bytes: &[u8]) -> VcsResult<Digest> {
        let digest = Digest::of_bytes(bytes);
        let path = self.commits_dir.join(digest.as_str());
        if !path.exists() {
            fs::write(&path, bytes)?;
            trace!(digest = %digest.short(), "stored commit");
        }
        Ok(digest)
    }

    /// Load a serialized commit record by digest.
    pub(crate) fn load_commit_bytes(&self, digest: &Digest) -> VcsResult<Vec<u8>> {
        let path = self.commits_dir.join(digest.as_str());
        if !path.exists() {
            return Err(VcsError::CommitNotFound(digest.to_string()));
        }
        Ok(fs::read(path)?)
    }

    /// Check whether a commit is present.
    pub fn commit_exists(&self, digest: &Digest) -> bool {
        self.commits_dir.join(digest.as_str()).exists()
    }

    /// List the digests of every stored commit, in no particular order.
    pub fn list_commits(&self) -> VcsResult<Vec<Digest>> {
        let mut digests = Vec::new();
        for entry in fs::read_dir(&self.commits_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                digests.push(Digest::from_hex_unchecked(name));
            }
        }
        Ok(digests)
    }

    /// Resolve an abbreviated commit digest to the full one.
    ///
    /// Scans the stored commit digests for a prefix match. Zero matches is
    /// `CommitNotFound`; more than one is `AmbiguousPrefix` rather than the
    /// first hit, since silently picking one of several candidates can point
    /// an operation at the wrong commit.
    pub fn resolve_prefix(&self, prefix: &str) -> VcsResult<Digest> {
        if prefix.is_empty() || prefix.len() > Digest::HEX_LEN {
            return Err(VcsError::CommitNotFound(prefix.to_string()));
        }
        let mut matches: Vec<Digest> = self
            .list_commits()?
            .into_iter()
            .filter(|d| d.as_str().starts_with(prefix))
            .collect();
        match matches.len() {
            0 => Err(VcsError::CommitNotFound(prefix.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(VcsError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                matches: n,
            }),
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

    #[test]
    fn test_store_blob_idempotent() {
        let (_dir, store) = setup();

        let d1 = store.store_blob(b"some content").unwrap();
        let d2 = store.store_blob(b"some content").unwrap();
        assert_eq!(d1, d2);

        let loaded = store.load_blob(&d1).unwrap();
        assert_eq!(loaded, b"some content");
    }

    #[test]
    fn test_load_missing_blob_fails() {
        let (_dir, store) = setup();

        let missing = Digest::of_bytes(b"never stored");
        let result = store.load_blob(&missing);
        assert!(matches!(result, Err(VcsError::ObjectNotFound(_))));
    }

    #[test]
    fn test_distinct_content_distinct_digest() {
        let (_dir, store) = setup();

        let d1 = store.store_blob(b"v1").unwrap();
        let d2 = store.store_blob(b"v2").unwrap();
        assert_ne!(d1, d2);
        assert_eq!(store.load_blob(&d1).unwrap(), b"v1");
        assert_eq!(store.load_blob(&d2).unwrap(), b"v2");
    }

    #[test]
    fn test_commit_bytes_round_trip() {
        let (_dir, store) = setup();

        let digest = store.store_commit_bytes(b"{\"message\":\"x\"}").unwrap();
        assert!(store.commit_exists(&digest));
        assert_eq!(store.load_commit_bytes(&digest).unwrap(), b"{\"message\":\"x\"}");
    }

    #[test]
    fn test_resolve_prefix() {
        let (_dir, store) = setup();

        let digest = store.store_commit_bytes(b"commit one").unwrap();
        let resolved = store.resolve_prefix(&digest.as_str()[..8]).unwrap();
        assert_eq!(resolved, digest);

        // full-length prefix resolves too
        let resolved = store.resolve_prefix(digest.as_str()).unwrap();
        assert_eq!(resolved, digest);
    }

    #[test]
    fn test_resolve_prefix_no_match() {
        let (_dir, store) = setup();
        store.store_commit_bytes(b"commit one").unwrap();

        let result = store.resolve_prefix("zzzzzz");
        assert!(matches!(result, Err(VcsError::CommitNotFound(_))));

        let result = store.resolve_prefix("");
        assert!(matches!(result, Err(VcsError::CommitNotFound(_))));
    }

    #[test]
    fn test_resolve_prefix_ambiguous() {
        let (_dir, store) = setup();

        // store commits until two digests share a first hex char
        let mut digests: Vec<Digest> = Vec::new();
        for i in 0..64u32 {
            let bytes = format!("commit {}", i).into_bytes();
            digests.push(store.store_commit_bytes(&bytes).unwrap());
        }
        let first = digests[0].as_str()[..1].to_string();
        let shared = digests
            .iter()
            .filter(|d| d.as_str().starts_with(&first))
            .count();
        assert!(shared > 1, "64 digests must collide on one hex nibble");

        let result = store.resolve_prefix(&first);
        assert!(matches!(result, Err(VcsError::AmbiguousPrefix { .. })));
    }
}
