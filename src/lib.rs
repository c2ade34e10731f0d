//! vclite - a minimal content-addressed version-control engine
//!
//! This crate provides the core of a local version-control system: an
//! immutable object/commit model, named branch pointers over a commit DAG,
//! a persistent staging area, a working-tree classifier, and a three-way
//! merge built on a nearest-common-ancestor search. Presentation concerns
//! (argument parsing, log/status text formatting) are left to the caller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Repository                            │
//! │   (high-level API: add, commit, branches, merge, status)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    stage    │       │    merge    │       │    refs     │
//!  │ (pending Δ) │       │ (3-way)     │       │ (branches)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └─────────────────────┼─────────────────────┘
//!                               │
//!                               ▼
//!                ┌─────────────┐    ┌─────────────┐
//!                │   commit    │───▶│   object    │
//!                │  (history)  │    │   (store)   │
//!                └─────────────┘    └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vclite::Repository;
//!
//! let repo = Repository::init("./project").unwrap();
//! std::fs::write("./project/a.txt", "v1").unwrap();
//! repo.add("a.txt").unwrap();
//! repo.commit("first", None).unwrap();
//! ```

mod commit;
mod error;
mod merge;
mod object;
mod refs;
mod repo;
mod stage;
mod status;
mod types;

// Re-export public API
pub use commit::{Commit, History, ROOT_MESSAGE};
pub use error::{VcsError, VcsResult};
pub use merge::{classify as classify_merge_case, conflict_content, find_split_point, MergeAction, MergeCase};
pub use object::ObjectStore;
pub use refs::RefStore;
pub use repo::{MergeOutcome, Repository, VCS_DIR};
pub use stage::StagingArea;
pub use status::{classify, Status, WorkingTreeStatus};
pub use types::{BranchName, Digest, InvalidNameError};
