//! History reconstruction.
//!
//! [`History`] replays the revisions of a repository one at a time. For each
//! revision it parses every changed file the parser accepts, diffs the
//! resulting unit against the running snapshot and applies the edits as one
//! [`Transaction`].
//!
//! # Content Resolution
//!
//! For each changed path:
//! - absent content removes the unit;
//! - content that parses replaces the unit;
//! - a syntax error, or content that isn't UTF-8, keeps the most recently
//!   parsed version of the unit, or an empty unit if the file never parsed.
//!
//! The iterator is lazy. Dropping it between revisions leaves the snapshot at
//! the last fully applied transaction.

use std::collections::BTreeSet;
use std::vec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::HistoryConfig;
use crate::diff::diff_unit;
use crate::error::Result;
use crate::id;
use crate::model::SourceUnit;
use crate::parsing::{parse_content, ParseOutcome, Parser};
use crate::project_edit::ProjectEdit;
use crate::tree::SourceTree;
use crate::versioning::{Revision, VersionControl};

/// The edits of one revision plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Id of the revision.
    pub revision_id: String,
    /// Commit date of the revision.
    pub date: DateTime<Utc>,
    /// Author of the revision.
    pub author: String,
    /// Edits in application order.
    pub edits: Vec<ProjectEdit>,
}

impl Transaction {
    fn new(revision: &Revision, edits: Vec<ProjectEdit>) -> Self {
        Transaction {
            revision_id: revision.id().to_string(),
            date: revision.date(),
            author: revision.author().to_string(),
            edits,
        }
    }

    /// Whether this transaction changes nothing.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Paths of the units touched by this transaction.
    pub fn changed_paths(&self) -> BTreeSet<&str> {
        self.edits.iter().map(ProjectEdit::source_path).collect()
    }
}

/// Lazy iterator over the transactions of a repository, oldest first.
///
/// Yields an error and stops if the version-control system or the parser
/// fails; the snapshot then reflects every transaction yielded before.
pub struct History<'a> {
    vcs: &'a dyn VersionControl,
    parser: &'a dyn Parser,
    config: HistoryConfig,
    revisions: vec::IntoIter<Revision>,
    snapshot: SourceTree,
    failed: bool,
}

impl<'a> History<'a> {
    /// Start replaying the history of `vcs` from an empty snapshot.
    pub fn new(vcs: &'a dyn VersionControl, parser: &'a dyn Parser, config: HistoryConfig) -> Result<Self> {
        let revisions = vcs.list_revisions()?;
        debug!(revisions = revisions.len(), "listed revisions");
        Ok(History {
            vcs,
            parser,
            config,
            revisions: revisions.into_iter(),
            snapshot: SourceTree::empty(),
            failed: false,
        })
    }

    /// The snapshot after the last yielded transaction.
    pub fn snapshot(&self) -> &SourceTree {
        &self.snapshot
    }

    /// Consume the history and return its snapshot.
    ///
    /// Revisions not yet yielded are never applied.
    pub fn into_snapshot(self) -> SourceTree {
        self.snapshot
    }

    /// Resolves the version of the unit at `path` after `revision`.
    fn resolve_unit(&self, revision: &Revision, path: &str) -> Result<Option<SourceUnit>> {
        let Some(bytes) = self.vcs.file_content(revision.id(), path)? else {
            return Ok(None);
        };
        match parse_content(self.parser, path, bytes)? {
            ParseOutcome::Parsed(unit) => Ok(Some(unit)),
            ParseOutcome::SyntaxError => {
                warn!(revision = revision.id(), path, "syntax error, keeping last parsed version");
                match self.snapshot.unit(path) {
                    Some(unit) => Ok(Some(unit.clone())),
                    None => Ok(Some(SourceUnit::empty(path)?)),
                }
            }
        }
    }

    fn process(&mut self, revision: &Revision) -> Result<Transaction> {
        let paths = self.vcs.changed_paths(revision.id())?;
        let mut edits = Vec::new();
        for path in paths.iter().filter(|p| self.parser.can_parse(p)) {
            if !id::is_valid_path(path) {
                warn!(revision = revision.id(), path = %path, "skipping invalid source path");
                continue;
            }
            let after = self.resolve_unit(revision, path)?;
            edits.extend(diff_unit(self.snapshot.unit(path), after.as_ref())?);
        }
        self.snapshot.apply_all(&edits)?;
        info!(revision = revision.id(), edits = edits.len(), "processed revision");
        Ok(Transaction::new(revision, edits))
    }
}

impl Iterator for History<'_> {
    type Item = Result<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let revision = self.revisions.next()?;
            match self.process(&revision) {
                Ok(transaction) if transaction.is_empty() && !self.config.emit_empty_transactions => {
                    continue;
                }
                Ok(transaction) => return Some(Ok(transaction)),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// All transactions of a repository and the final snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryReport {
    /// Transactions in revision order, oldest first.
    pub transactions: Vec<Transaction>,
    /// The snapshot at the head revision.
    pub snapshot: SourceTree,
}

/// Replay the whole history of `vcs`.
pub fn build_history(vcs: &dyn VersionControl, parser: &dyn Parser, config: &HistoryConfig) -> Result<HistoryReport> {
    let mut history = History::new(vcs, parser, config.clone())?;
    let transactions = history.by_ref().collect::<Result<Vec<_>>>()?;
    Ok(HistoryReport {
        transactions,
        snapshot: history.into_snapshot(),
    })
}
