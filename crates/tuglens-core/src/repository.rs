//! Queries over the head revision of a repository.
//!
//! [`Repository`] pairs a [`VersionControl`] driver with a [`Parser`] and
//! answers questions about the current state of the code without replaying
//! the whole history: which sources exist, what each one looks like and what
//! the full snapshot is.
//!
//! A source whose head version has a syntax error resolves to its most recent
//! version that parses. The search stops at the last deletion of the file, so
//! a file that was deleted and re-added only with errors resolves to an empty
//! unit. This matches the snapshot [`History`] arrives at.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::error::{LensError, Result};
use crate::history::History;
use crate::id;
use crate::model::SourceUnit;
use crate::parsing::{parse_content, ParseOutcome, Parser};
use crate::tree::SourceTree;
use crate::versioning::{Revision, VersionControl};

/// Read-only view of a repository through a parser.
#[derive(Clone, Copy)]
pub struct Repository<'a> {
    vcs: &'a dyn VersionControl,
    parser: &'a dyn Parser,
}

impl<'a> Repository<'a> {
    pub fn new(vcs: &'a dyn VersionControl, parser: &'a dyn Parser) -> Self {
        Repository { vcs, parser }
    }

    /// Id of the head revision.
    ///
    /// Fails with an unknown-revision error if the repository has no commits.
    pub fn head_id(&self) -> Result<String> {
        Ok(self.vcs.head_revision()?.id().to_string())
    }

    /// Ids of every revision, oldest first.
    pub fn list_revisions(&self) -> Result<Vec<String>> {
        Ok(self
            .vcs
            .list_revisions()?
            .iter()
            .map(|r| r.id().to_string())
            .collect())
    }

    /// The revision named `revision_id`, if it exists.
    pub fn revision(&self, revision_id: &str) -> Result<Option<Revision>> {
        Ok(self.vcs.revision(revision_id)?)
    }

    /// Revisions that changed `path`, oldest first.
    pub fn path_history(&self, path: &str) -> Result<Vec<Revision>> {
        check_path(path)?;
        Ok(self.vcs.path_history(path)?)
    }

    /// Paths of the files at the head revision that the parser accepts.
    pub fn list_sources(&self) -> Result<BTreeSet<String>> {
        let head = self.vcs.head_revision()?;
        let sources: BTreeSet<String> = self
            .vcs
            .list_files(head.id())?
            .into_iter()
            .filter(|path| self.parser.can_parse(path))
            .filter(|path| {
                let valid = id::is_valid_path(path);
                if !valid {
                    warn!(path = %path, "skipping invalid source path");
                }
                valid
            })
            .collect();
        debug!(head = head.id(), sources = sources.len(), "listed sources");
        Ok(sources)
    }

    /// The unit at `path` as of the head revision.
    ///
    /// Returns `None` if `path` is not one of [`list_sources`]. Fails with an
    /// argument error if `path` is not a valid unit path.
    ///
    /// [`list_sources`]: Repository::list_sources
    pub fn source(&self, path: &str) -> Result<Option<SourceUnit>> {
        check_path(path)?;
        if !self.parser.can_parse(path) {
            return Ok(None);
        }
        let head = self.vcs.head_revision()?;
        if !self.vcs.list_files(head.id())?.contains(path) {
            return Ok(None);
        }
        self.latest_parsed(path).map(Some)
    }

    /// Walks the versions of `path` from newest to oldest until one parses.
    fn latest_parsed(&self, path: &str) -> Result<SourceUnit> {
        for revision in self.vcs.path_history(path)?.iter().rev() {
            let Some(bytes) = self.vcs.file_content(revision.id(), path)? else {
                debug!(revision = revision.id(), path, "source was deleted, no earlier version applies");
                break;
            };
            match parse_content(self.parser, path, bytes)? {
                ParseOutcome::Parsed(unit) => return Ok(unit),
                ParseOutcome::SyntaxError => {
                    warn!(revision = revision.id(), path, "syntax error, trying an older version");
                }
            }
        }
        SourceUnit::empty(path)
    }

    /// Every source at the head revision.
    pub fn snapshot(&self) -> Result<SourceTree> {
        let mut units = Vec::new();
        for path in self.list_sources()? {
            units.push(self.latest_parsed(&path)?);
        }
        SourceTree::of(units)
    }

    /// Lazy replay of the repository history.
    pub fn history(&self, config: HistoryConfig) -> Result<History<'a>> {
        History::new(self.vcs, self.parser, config)
    }
}

fn check_path(path: &str) -> Result<()> {
    if id::is_valid_path(path) {
        Ok(())
    } else {
        Err(LensError::invalid_args(format!("invalid source path '{}'", path)))
    }
}
