//! Structural diff between two snapshots.
//!
//! The diff runs in two passes over a working copy of the source index:
//!
//! 1. **Creation pass.** Ids are visited by increasing length, so parents
//!    come before their children. An id that is only in the working copy is
//!    removed, an id that is only in the destination is added with its whole
//!    subtree, and an id whose node changed kind is removed then re-added.
//!    Each edit is applied to the working copy right away, which makes
//!    descendants of added or removed nodes disappear from later checks.
//! 2. **Mutation pass.** Every id of the destination is visited by decreasing
//!    length and its attributes are compared with [`diff_node`]. Emitted edits
//!    are applied to the working copy as well.
//!
//! The result only depends on the content of the two snapshots, and replaying
//! it on the source yields the destination.

use std::cmp::Reverse;

use tracing::debug;

use crate::error::Result;
use crate::model::SourceUnit;
use crate::project_edit::{diff_node, AddNode, ProjectEdit, RemoveNode};
use crate::tree::{NodeIndex, SourceTree};

/// Returns the edits that turn `before` into `after`.
pub fn diff(before: &SourceTree, after: &SourceTree) -> Result<Vec<ProjectEdit>> {
    diff_indexes(before.index(), after.index())
}

/// Returns the edits that turn the snapshot made of `before` into the one
/// made of `after`.
///
/// Both sides are validated as in [`SourceTree::of`].
pub fn diff_units(before: &[SourceUnit], after: &[SourceUnit]) -> Result<Vec<ProjectEdit>> {
    let before = SourceTree::of(before.iter().cloned())?;
    let after = SourceTree::of(after.iter().cloned())?;
    diff(&before, &after)
}

/// Returns the edits that turn one version of a unit into another.
///
/// `None` stands for an absent unit, so `(None, Some(u))` adds `u` and
/// `(Some(u), None)` removes it.
pub fn diff_unit(before: Option<&SourceUnit>, after: Option<&SourceUnit>) -> Result<Vec<ProjectEdit>> {
    diff_indexes(&NodeIndex::of_units(before), &NodeIndex::of_units(after))
}

fn diff_indexes(before: &NodeIndex, after: &NodeIndex) -> Result<Vec<ProjectEdit>> {
    let mut working = before.clone();
    let mut edits = Vec::new();

    let mut ids: Vec<&str> = before.ids().chain(after.ids().filter(|id| !before.contains(id))).collect();
    ids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    for id in ids {
        let current = working.get(id);
        let target = after.get(id);
        let (remove, add) = match (current, target) {
            (Some(_), None) => (true, None),
            (None, Some(node)) => (false, Some(node)),
            (Some(node), Some(other)) if node.kind() != other.kind() => (true, Some(other)),
            _ => (false, None),
        };
        if remove {
            let edit = ProjectEdit::from(RemoveNode::new(id)?);
            edit.apply_on(&mut working)?;
            edits.push(edit);
        }
        if let Some(node) = add {
            let edit = ProjectEdit::from(AddNode::new(node.clone())?);
            edit.apply_on(&mut working)?;
            edits.push(edit);
        }
    }

    let mut ids: Vec<&str> = after.ids().collect();
    ids.sort_by_key(|id| (Reverse(id.len()), *id));

    for id in ids {
        let (Some(current), Some(target)) = (working.get(id), after.get(id)) else {
            continue;
        };
        if let Some(edit) = diff_node(current, target)? {
            edit.apply_on(&mut working)?;
            edits.push(edit);
        }
    }

    debug!(edits = edits.len(), "computed snapshot diff");
    Ok(edits)
}

// ============================================================================
// Tests
// ============================================================================
