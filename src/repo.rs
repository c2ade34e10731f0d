//! The repository handle: every engine operation lives here.
//!
//! A `Repository` is an explicit context passed around by the caller, not a
//! global: it holds the working-directory root and the three stores (objects,
//! refs, staging) rooted under `.vclite/`. Operations perform their full
//! read-modify-persist cycle before returning; objects are always written
//! before the branch ref that points at them, so a crash mid-operation can
//! only orphan objects, never dangle a reference.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::commit::{Commit, History};
use crate::error::{VcsError, VcsResult};
use crate::merge::{self, MergeAction};
use crate::object::ObjectStore;
use crate::refs::RefStore;
use crate::stage::StagingArea;
use crate::status::{classify, Status, WorkingTreeStatus};
use crate::types::{BranchName, Digest};

/// name of the reserved repository directory under the working root
pub const VCS_DIR: &str = ".vclite";
const OBJECTS_DIR: &str = "objects";

/// The result of a completed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// digest of the two-parent merge commit
    pub commit: Digest,
    /// files that ended up with conflict markers, sorted
    pub conflicts: Vec<String>,
}

/// A local repository: working root plus the persistent stores.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    vcs_dir: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Initialize a fresh repository under `root`.
    ///
    /// Creates the `.vclite/` layout, stores the deterministic root commit,
    /// points a new `master` branch at it, and sets HEAD.
    pub fn init(root: impl AsRef<Path>) -> VcsResult<Self> {
        let root = root.as_ref().to_path_buf();
        let vcs_dir = root.join(VCS_DIR);
        if vcs_dir.exists() {
            return Err(VcsError::AlreadyInitialized(root));
        }
        fs::create_dir_all(&vcs_dir)?;

        let objects = ObjectStore::create(&vcs_dir.join(OBJECTS_DIR))?;
        let refs = RefStore::create(&vcs_dir)?;
        StagingArea::init(&vcs_dir)?;

        let root_digest = Commit::root().store(&objects)?;
        let master = BranchName::master();
        refs.create_branch(&master, &root_digest)?;
        refs.set_head(&master)?;

        info!(root = %root.display(), commit = %root_digest.short(), "initialized repository");
        Ok(Self {
            root,
            vcs_dir,
            objects,
            refs,
        })
    }

    /// Open an existing repository under `root`.
    pub fn open(root: impl AsRef<Path>) -> VcsResult<Self> {
        let root = root.as_ref().to_path_buf();
        let vcs_dir = root.join(VCS_DIR);
        if !vcs_dir.exists() {
            return Err(VcsError::NotInitialized(root));
        }
        let objects = ObjectStore::open(&vcs_dir.join(OBJECTS_DIR));
        let refs = RefStore::open(&vcs_dir);
        Ok(Self {
            root,
            vcs_dir,
            objects,
            refs,
        })
    }

    /// the working-directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// the content-addressed object store
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// the branch/HEAD table
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// the staging area as currently persisted
    pub fn staging(&self) -> VcsResult<StagingArea> {
        StagingArea::load(&self.vcs_dir)
    }

    // ==================== Commit graph queries ====================

    /// The commit HEAD currently dereferences to, with its digest.
    pub fn current_commit(&self) -> VcsResult<(Digest, Commit)> {
        let digest = self.refs.head_commit()?;
        let commit = Commit::load(&self.objects, &digest)?;
        Ok((digest, commit))
    }

    /// Look up a commit by full digest or abbreviated prefix.
    pub fn commit_by_ref(&self, commit_ref: &str) -> VcsResult<(Digest, Commit)> {
        let digest = if commit_ref.len() == Digest::HEX_LEN {
            let digest = Digest::from_hex_unchecked(commit_ref);
            if !self.objects.commit_exists(&digest) {
                return Err(VcsError::CommitNotFound(commit_ref.to_string()));
            }
            digest
        } else {
            self.objects.resolve_prefix(commit_ref)?
        };
        let commit = Commit::load(&self.objects, &digest)?;
        Ok((digest, commit))
    }

    /// The first-parent history from HEAD back to the root, newest first.
    pub fn log(&self) -> VcsResult<Vec<(Digest, Commit)>> {
        History::from(&self.objects, self.refs.head_commit()?).collect()
    }

    /// Every stored commit, in no particular order.
    pub fn global_log(&self) -> VcsResult<Vec<(Digest, Commit)>> {
        let mut out = Vec::new();
        for digest in self.objects.list_commits()? {
            let commit = Commit::load(&self.objects, &digest)?;
            out.push((digest, commit));
        }
        Ok(out)
    }

    /// Digests of all commits whose message equals `message` exactly.
    /// Fails `CommitNotFound` when nothing matches.
    pub fn find(&self, message: &str) -> VcsResult<Vec<Digest>> {
        let mut out = Vec::new();
        for (digest, commit) in self.global_log()? {
            if commit.message() == message {
                out.push(digest);
            }
        }
        if out.is_empty() {
            return Err(VcsError::CommitNotFound(message.to_string()));
        }
        Ok(out)
    }

    // ==================== Staging operations ====================

    /// Stage a file's working content for addition.
    ///
    /// If the working content hashes to exactly the version tracked by the
    /// current commit, the file is dropped from both staging maps instead
    /// (it was changed and then changed back). Otherwise the content is
    /// persisted as a blob and recorded under additions.
    pub fn add(&self, file: &str) -> VcsResult<()> {
        let content = fs::read(self.work_path(file))?;
        let digest = Digest::of_bytes(&content);

        let (_, current) = self.current_commit()?;
        let mut stage = self.staging()?;

        if current.tracked(file) == Some(&digest) {
            stage.unstage(file);
        } else {
            let stored = self.objects.store_blob(&content)?;
            stage.stage_addition(file, stored);
        }
        stage.save(&self.vcs_dir)?;
        debug!(file, digest = %digest.short(), "staged addition");
        Ok(())
    }

    /// Stage a file for removal.
    ///
    /// Unstages a pending addition; if the file is tracked by the current
    /// commit, records its tracked digest under removals and deletes the
    /// working copy. Fails `NothingToRemove` when the file is neither staged
    /// for addition nor tracked.
    pub fn remove(&self, file: &str) -> VcsResult<()> {
        let (_, current) = self.current_commit()?;
        let mut stage = self.staging()?;

        let was_staged = stage.unstage_addition(file);
        match current.tracked(file) {
            Some(tracked) => {
                stage.stage_removal(file, tracked.clone());
                let path = self.work_path(file);
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
            None if !was_staged => {
                return Err(VcsError::NothingToRemove(file.to_string()));
            }
            None => {}
        }
        stage.save(&self.vcs_dir)?;
        debug!(file, "staged removal");
        Ok(())
    }

    /// Fold the staged change-set into a new commit and advance the active
    /// branch. The commit object is persisted before the branch ref moves.
    pub fn commit(&self, message: &str, second_parent: Option<Digest>) -> VcsResult<Digest> {
        if message.trim().is_empty() {
            return Err(VcsError::EmptyMessage);
        }
        let mut stage = self.staging()?;
        if stage.is_empty() {
            return Err(VcsError::NoChangesStaged);
        }

        let (parent_digest, parent) = self.current_commit()?;
        let file_map = stage.apply_to(parent.file_map_copy());
        let commit = Commit::new(message, file_map, parent_digest, second_parent);

        let digest = commit.store(&self.objects)?;
        let branch = self.refs.head_branch()?;
        self.refs.update_branch(&branch, &digest)?;

        stage.clear();
        stage.save(&self.vcs_dir)?;

        info!(commit = %digest.short(), message = commit.summary(), "created commit");
        Ok(digest)
    }

    // ==================== Status ====================

    /// The full status report: branches plus the four working-tree categories.
    pub fn status(&self) -> VcsResult<Status> {
        let (_, current) = self.current_commit()?;
        let stage = self.staging()?;
        let working = self.working_digests()?;
        Ok(Status {
            branches: self.refs.list_branches()?,
            current_branch: self.refs.head_branch()?,
            tree: classify(current.file_map(), &stage, &working),
        })
    }

    /// The working-tree categories alone.
    pub fn working_tree_status(&self) -> VcsResult<WorkingTreeStatus> {
        Ok(self.status()?.tree)
    }

    /// Filenames in the working directory that are neither tracked nor
    /// staged for addition (including removed-then-recreated files).
    pub fn untracked_files(&self) -> VcsResult<Vec<String>> {
        Ok(self.working_tree_status()?.untracked)
    }

    // ==================== Checkout, branches, reset ====================

    /// Overwrite a working file with the version tracked by the commit that
    /// `commit_ref` resolves to.
    pub fn checkout_file(&self, commit_ref: &str, file: &str) -> VcsResult<()> {
        let (_, commit) = self.commit_by_ref(commit_ref)?;
        self.restore_file(&commit, file)
    }

    /// Overwrite a working file with the current commit's version.
    pub fn checkout_head_file(&self, file: &str) -> VcsResult<()> {
        let (_, current) = self.current_commit()?;
        self.restore_file(&current, file)
    }

    /// Make `name` the active branch and materialize its snapshot.
    ///
    /// Guards: the branch must exist, must not already be active, and no
    /// untracked working file may be clobbered with different content. The
    /// staging area is cleared.
    pub fn checkout_branch(&self, name: &str) -> VcsResult<()> {
        let branch = BranchName::new(name)?;
        if branch == self.refs.head_branch()? {
            return Err(VcsError::SelfOperation(name.to_string()));
        }
        let tip = self.refs.resolve(&branch)?;
        let commit = Commit::load(&self.objects, &tip)?;

        self.ensure_no_untracked_conflict(commit.file_map())?;
        self.materialize(&commit)?;
        self.refs.set_head(&branch)?;

        info!(branch = %branch, commit = %tip.short(), "checked out branch");
        Ok(())
    }

    /// Create a branch pointing at the current commit. HEAD does not move.
    pub fn branch(&self, name: &str) -> VcsResult<()> {
        let branch = BranchName::new(name)?;
        let head = self.refs.head_commit()?;
        self.refs.create_branch(&branch, &head)
    }

    /// Delete a branch pointer. The active branch cannot be deleted.
    pub fn remove_branch(&self, name: &str) -> VcsResult<()> {
        let branch = BranchName::new(name)?;
        if branch == self.refs.head_branch()? {
            return Err(VcsError::SelfOperation(name.to_string()));
        }
        self.refs.delete_branch(&branch)
    }

    /// Move the active branch to the commit `commit_ref` resolves to and
    /// materialize that snapshot.
    pub fn reset(&self, commit_ref: &str) -> VcsResult<()> {
        let (digest, commit) = self.commit_by_ref(commit_ref)?;
        self.ensure_no_untracked_conflict(commit.file_map())?;

        let branch = self.refs.head_branch()?;
        self.refs.update_branch(&branch, &digest)?;
        self.materialize(&commit)?;

        info!(commit = %digest.short(), "reset");
        Ok(())
    }

    // ==================== Merge ====================

    /// Merge the named branch into the active one.
    ///
    /// Reconciles each file in the union of the split point's, the current
    /// tip's, and the other tip's snapshots, then finishes with an ordinary
    /// two-parent commit. Per-file conflicts are reported in the outcome,
    /// not fatal. Shortcuts: merging an ancestor reports `AlreadyAncestor`;
    /// when the current tip is itself the split point the other branch is
    /// checked out and `FastForwarded` is reported. Neither produces a merge
    /// commit.
    pub fn merge(&self, name: &str) -> VcsResult<MergeOutcome> {
        let other_branch = BranchName::new(name)?;
        let current_branch = self.refs.head_branch()?;
        if other_branch == current_branch {
            return Err(VcsError::SelfOperation(name.to_string()));
        }

        let other_tip = self.refs.resolve(&other_branch)?;
        let other = Commit::load(&self.objects, &other_tip)?;
        let (current_tip, current) = self.current_commit()?;

        self.ensure_no_untracked_conflict(other.file_map())?;

        let split = merge::find_split_point(&self.objects, &current_tip, &other_tip)?;
        if split == other_tip {
            return Err(VcsError::AlreadyAncestor);
        }
        if split == current_tip {
            self.checkout_branch(name)?;
            return Err(VcsError::FastForwarded);
        }
        let split_commit = Commit::load(&self.objects, &split)?;

        let mut files: BTreeSet<String> = BTreeSet::new();
        files.extend(split_commit.file_map().keys().cloned());
        files.extend(current.file_map().keys().cloned());
        files.extend(other.file_map().keys().cloned());

        let mut conflicts = Vec::new();
        for file in &files {
            let case = merge::classify(
                split_commit.tracked(file),
                current.tracked(file),
                other.tracked(file),
            );
            match case.action() {
                MergeAction::Keep => {}
                MergeAction::TakeOther => {
                    let digest = other.tracked(file).ok_or_else(|| {
                        VcsError::Internal(format!("take-other for {} with no other side", file))
                    })?;
                    let content = self.objects.load_blob(digest)?;
                    fs::write(self.work_path(file), content)?;
                    self.add(file)?;
                }
                MergeAction::Remove => {
                    self.remove(file)?;
                }
                MergeAction::Conflict => {
                    let ours = match current.tracked(file) {
                        Some(d) => Some(self.objects.load_blob(d)?),
                        None => None,
                    };
                    let theirs = match other.tracked(file) {
                        Some(d) => Some(self.objects.load_blob(d)?),
                        None => None,
                    };
                    let content =
                        merge::conflict_content(ours.as_deref(), theirs.as_deref());
                    fs::write(self.work_path(file), content)?;
                    self.add(file)?;
                    conflicts.push(file.clone());
                }
            }
        }

        let message = format!("Merged {} into {}.", other_branch, current_branch);
        let commit = self.commit(&message, Some(other_tip))?;

        info!(
            commit = %commit.short(),
            conflicts = conflicts.len(),
            "merged {} into {}", other_branch, current_branch
        );
        Ok(MergeOutcome { commit, conflicts })
    }

    // ==================== Working-directory helpers ====================

    fn work_path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Plain files directly under the root; subdirectories (the repository
    /// directory included) are ignored.
    fn list_working(&self) -> VcsResult<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// The working listing with each file's content digest. Contents are
    /// re-read on every call, never cached.
    fn working_digests(&self) -> VcsResult<BTreeMap<String, Digest>> {
        let mut map = BTreeMap::new();
        for file in self.list_working()? {
            let content = fs::read(self.work_path(&file))?;
            map.insert(file, Digest::of_bytes(&content));
        }
        Ok(map)
    }

    fn restore_file(&self, commit: &Commit, file: &str) -> VcsResult<()> {
        let digest = commit
            .tracked(file)
            .ok_or_else(|| VcsError::FileNotInCommit(file.to_string()))?;
        let content = self.objects.load_blob(digest)?;
        fs::write(self.work_path(file), content)?;
        Ok(())
    }

    /// Replace the working tree with a commit's snapshot and clear staging.
    fn materialize(&self, commit: &Commit) -> VcsResult<()> {
        for file in self.list_working()? {
            fs::remove_file(self.work_path(&file))?;
        }
        for (file, digest) in commit.file_map() {
            let content = self.objects.load_blob(digest)?;
            fs::write(self.work_path(file), content)?;
        }
        let mut stage = self.staging()?;
        stage.clear();
        stage.save(&self.vcs_dir)
    }

    /// Fail `UntrackedConflict` if an untracked working file would be
    /// overwritten with different content by materializing `target_map`.
    fn ensure_no_untracked_conflict(
        &self,
        target_map: &BTreeMap<String, Digest>,
    ) -> VcsResult<()> {
        for file in self.untracked_files()? {
            let working = Digest::of_bytes(&fs::read(self.work_path(&file))?);
            match target_map.get(&file) {
                Some(tracked) if *tracked == working => {}
                _ => return Err(VcsError::UntrackedConflict(file)),
            }
        }
        Ok(())
    }
}
