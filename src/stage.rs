//! The staging area: pending additions and removals between commits.
//!
//! The staging area is an explicit value object holding two maps, persisted
//! as newline-delimited `"<filename> <digest>"` records in `stage_add` and
//! `stage_del`. Both files are rewritten wholesale on every mutation, via a
//! temporary file renamed into place so a crash mid-write cannot leave a
//! half-written record behind.
//!
//! Invariant: after every reconciling call, `additions` and `removals` are
//! mutually exclusive for any given filename.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{VcsError, VcsResult};
use crate::types::Digest;

const STAGE_ADD_FILE: &str = "stage_add";
const STAGE_DEL_FILE: &str = "stage_del";

/// The pending change-set accumulated before the next commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingArea {
    additions: BTreeMap<String, Digest>,
    removals: BTreeMap<String, Digest>,
}

impl StagingArea {
    /// files staged for addition, keyed by filename
    pub fn additions(&self) -> &BTreeMap<String, Digest> {
        &self.additions
    }

    /// files staged for removal, keyed by filename; the digest is the
    /// pre-removal tracked version
    pub fn removals(&self) -> &BTreeMap<String, Digest> {
        &self.removals
    }

    /// true when nothing is staged in either direction
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// the digest staged for addition under this filename, if any
    pub fn staged_for_addition(&self, file: &str) -> Option<&Digest> {
        self.additions.get(file)
    }

    /// whether this filename is staged for removal
    pub fn staged_for_removal(&self, file: &str) -> bool {
        self.removals.contains_key(file)
    }

    /// Stage a file for addition, dropping any pending removal of it.
    pub fn stage_addition(&mut self, file: impl Into<String>, digest: Digest) {
        let file = file.into();
        self.removals.remove(&file);
        self.additions.insert(file, digest);
    }

    /// Stage a tracked file for removal, dropping any pending addition of it.
    pub fn stage_removal(&mut self, file: impl Into<String>, tracked: Digest) {
        let file = file.into();
        self.additions.remove(&file);
        self.removals.insert(file, tracked);
    }

    /// Drop the file from both maps (the re-staging no-op: the working copy
    /// went back to the committed version).
    pub fn unstage(&mut self, file: &str) {
        self.additions.remove(file);
        self.removals.remove(file);
    }

    /// Drop a pending addition only, returning whether one was present.
    pub fn unstage_addition(&mut self, file: &str) -> bool {
        self.additions.remove(file).is_some()
    }

    /// Clear both maps. Runs after every successful commit and checkout.
    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    /// Fold this change-set into a parent snapshot: every addition upserted,
    /// then every removal key deleted. The fixed order means a file staged
    /// both ways in one cycle ends removed.
    pub fn apply_to(&self, mut snapshot: BTreeMap<String, Digest>) -> BTreeMap<String, Digest> {
        for (file, digest) in &self.additions {
            snapshot.insert(file.clone(), digest.clone());
        }
        for file in self.removals.keys() {
            snapshot.remove(file);
        }
        snapshot
    }

    // ==================== Persistence ====================

    fn paths(vcs_dir: &Path) -> (PathBuf, PathBuf) {
        (vcs_dir.join(STAGE_ADD_FILE), vcs_dir.join(STAGE_DEL_FILE))
    }

    /// Create the two empty staging files.
    pub(crate) fn init(vcs_dir: &Path) -> VcsResult<()> {
        StagingArea::default().save(vcs_dir)
    }

    /// Read the staging area wholesale from disk.
    pub(crate) fn load(vcs_dir: &Path) -> VcsResult<Self> {
        let (add_path, del_path) = Self::paths(vcs_dir);
        Ok(Self {
            additions: read_records(&add_path)?,
            removals: read_records(&del_path)?,
        })
    }

    /// Write the staging area wholesale to disk.
    pub(crate) fn save(&self, vcs_dir: &Path) -> VcsResult<()> {
        let (add_path, del_path) = Self::paths(vcs_dir);
        write_records(vcs_dir, &add_path, &self.additions)?;
        write_records(vcs_dir, &del_path, &self.removals)?;
        Ok(())
    }
}

fn read_records(path: &Path) -> VcsResult<BTreeMap<String, Digest>> {
    let mut map = BTreeMap::new();
    if !path.exists() {
        return Ok(map);
    }
    let content = fs::read_to_string(path)?;
    for line in content.lines().filter(|l| !l.is_empty()) {
        let (file, digest) = line.rsplit_once(' ').ok_or_else(|| {
            VcsError::Internal(format!("malformed staging record: {:?}", line))
        })?;
        map.insert(file.to_string(), Digest::from_hex_unchecked(digest));
    }
    Ok(map)
}

fn write_records(
    vcs_dir: &Path,
    path: &Path,
    records: &BTreeMap<String, Digest>,
) -> VcsResult<()> {
    let mut tmp = NamedTempFile::new_in(vcs_dir)?;
    for (file, digest) in records {
        writeln!(tmp, "{} {}", file, digest)?;
    }
    tmp.persist(path).map_err(|e| VcsError::Io(e.error))?;
    Ok(())
}
