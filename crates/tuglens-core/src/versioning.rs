//! Version-control capability.
//!
//! History reconstruction reads revisions, change sets and file contents
//! through the [`VersionControl`] trait. [`MemoryVcs`] is an in-memory
//! implementation for fixtures; the `tuglens-git` crate drives a real git
//! repository.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result, VcsError};

/// Returns whether `id` is a valid revision id (non-empty, alphanumeric).
pub fn is_valid_revision_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(char::is_alphanumeric)
}

/// One revision of the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    id: String,
    date: DateTime<Utc>,
    author: String,
}

impl Revision {
    /// Create a revision.
    ///
    /// Fails with an argument error if `id` is not a valid revision id or if
    /// `date` is before the Unix epoch.
    pub fn new(id: impl Into<String>, date: DateTime<Utc>, author: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_valid_revision_id(&id) {
            return Err(LensError::invalid_args(format!("invalid revision id '{}'", id)));
        }
        if date.timestamp() < 0 {
            return Err(LensError::invalid_args(format!(
                "revision '{}' date {} is before the epoch",
                id, date
            )));
        }
        Ok(Revision {
            id,
            date,
            author: author.into(),
        })
    }

    /// Create a revision from a commit time in seconds since the epoch.
    pub fn from_unix_seconds(id: impl Into<String>, seconds: i64, author: impl Into<String>) -> Result<Self> {
        let date = DateTime::<Utc>::from_timestamp(seconds, 0)
            .ok_or_else(|| LensError::invalid_args(format!("timestamp {} is out of range", seconds)))?;
        Revision::new(id, date, author)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}

/// Read access to a version-controlled repository.
///
/// Implementations follow the first-parent history of the current branch.
pub trait VersionControl {
    /// The revision currently checked out.
    fn head_revision(&self) -> Result<Revision, VcsError>;

    /// Every revision up to the head, oldest first.
    fn list_revisions(&self) -> Result<Vec<Revision>, VcsError>;

    /// The revision named `revision_id`, or `None` if there is no such
    /// revision.
    fn revision(&self, revision_id: &str) -> Result<Option<Revision>, VcsError>;

    /// Revisions that changed `path`, oldest first.
    ///
    /// The default implementation checks the changed paths of every
    /// revision. Drivers with a native path log should override it.
    fn path_history(&self, path: &str) -> Result<Vec<Revision>, VcsError> {
        let mut history = Vec::new();
        for revision in self.list_revisions()? {
            if self.changed_paths(revision.id())?.contains(path) {
                history.push(revision);
            }
        }
        Ok(history)
    }

    /// Paths of files added, modified or deleted by `revision_id`.
    fn changed_paths(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError>;

    /// Paths of all files that exist at `revision_id`.
    fn list_files(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError>;

    /// Content of `path` at `revision_id`, or `None` if the file doesn't
    /// exist at that revision.
    fn file_content(&self, revision_id: &str, path: &str) -> Result<Option<Vec<u8>>, VcsError>;
}

// ============================================================================
// In-Memory Repository
// ============================================================================

/// One commit of a [`MemoryVcs`]: a revision plus the files it writes and
/// deletes.
#[derive(Debug, Clone)]
pub struct MemoryCommit {
    revision: Revision,
    changes: BTreeMap<String, Option<Vec<u8>>>,
}

impl MemoryCommit {
    pub fn new(revision: Revision) -> Self {
        MemoryCommit {
            revision,
            changes: BTreeMap::new(),
        }
    }

    /// Create or overwrite `path`.
    pub fn write(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.changes.insert(path.into(), Some(content.into()));
        self
    }

    /// Delete `path`.
    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.changes.insert(path.into(), None);
        self
    }
}

#[derive(Debug, Clone)]
struct StoredCommit {
    revision: Revision,
    changed: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

/// A linear in-memory repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryVcs {
    commits: Vec<StoredCommit>,
}

impl MemoryVcs {
    pub fn new() -> Self {
        MemoryVcs::default()
    }

    /// Append `commit` on top of the current head.
    ///
    /// Fails if a commit with the same revision id already exists.
    pub fn with_commit(mut self, commit: MemoryCommit) -> Result<Self, VcsError> {
        if self.find(commit.revision.id()).is_some() {
            return Err(VcsError::Malformed {
                message: format!("duplicate revision '{}'", commit.revision.id()),
            });
        }
        let mut files = self.commits.last().map(|c| c.files.clone()).unwrap_or_default();
        let mut changed = BTreeSet::new();
        for (path, content) in commit.changes {
            match content {
                Some(content) => {
                    files.insert(path.clone(), content);
                }
                None => {
                    files.remove(&path);
                }
            }
            changed.insert(path);
        }
        self.commits.push(StoredCommit {
            revision: commit.revision,
            changed,
            files,
        });
        Ok(self)
    }

    fn find(&self, revision_id: &str) -> Option<&StoredCommit> {
        self.commits.iter().find(|c| c.revision.id() == revision_id)
    }

    fn get(&self, revision_id: &str) -> Result<&StoredCommit, VcsError> {
        self.find(revision_id).ok_or_else(|| VcsError::UnknownRevision {
            id: revision_id.to_string(),
        })
    }
}

impl VersionControl for MemoryVcs {
    fn head_revision(&self) -> Result<Revision, VcsError> {
        self.commits
            .last()
            .map(|c| c.revision.clone())
            .ok_or_else(|| VcsError::UnknownRevision {
                id: "HEAD".to_string(),
            })
    }

    fn list_revisions(&self) -> Result<Vec<Revision>, VcsError> {
        Ok(self.commits.iter().map(|c| c.revision.clone()).collect())
    }

    fn revision(&self, revision_id: &str) -> Result<Option<Revision>, VcsError> {
        Ok(self.find(revision_id).map(|c| c.revision.clone()))
    }

    fn changed_paths(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError> {
        Ok(self.get(revision_id)?.changed.clone())
    }

    fn list_files(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError> {
        Ok(self.get(revision_id)?.files.keys().cloned().collect())
    }

    fn file_content(&self, revision_id: &str, path: &str) -> Result<Option<Vec<u8>>, VcsError> {
        Ok(self.get(revision_id)?.files.get(path).cloned())
    }
}

// ============================================================================
// Tests
// ============================================================================
