//! Indexed snapshots.
//!
//! [`NodeIndex`] maps every qualified id of a snapshot to the current version
//! of its node. Each stored node still carries its whole subtree by value, so
//! the index is what keeps a node and its ancestors' copies of it in sync: an
//! edit updates the entry for the changed id and then rebuilds every ancestor
//! entry (see [`crate::project_edit`]).
//!
//! [`SourceTree`] pairs the index with a path-ordered map of units, which is
//! the value-level view of the snapshot used for equality and iteration.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{LensError, Result};
use crate::model::{NodeType, SourceNode, SourceUnit};
use crate::project_edit::ProjectEdit;

// ============================================================================
// Node Index
// ============================================================================

/// Mutable id → node map of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIndex {
    nodes: HashMap<String, SourceNode>,
}

impl NodeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        NodeIndex::default()
    }

    /// Index every node of `units`.
    pub fn of_units<'a>(units: impl IntoIterator<Item = &'a SourceUnit>) -> Self {
        let mut index = NodeIndex::new();
        for unit in units {
            index.insert_subtree(SourceNode::Unit(unit.clone()));
        }
        index
    }

    pub fn get(&self, id: &str) -> Option<&SourceNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Typed lookup.
    ///
    /// Fails with [`LensError::NodeNotFound`] if `id` is absent and with
    /// [`LensError::WrongKind`] if the node has another kind.
    pub fn get_as<T: NodeType>(&self, id: &str) -> Result<&T> {
        self.get(id)
            .ok_or_else(|| LensError::not_found(id))?
            .cast::<T>()
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All indexed ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Stores `node` and every node below it, overwriting existing entries.
    pub fn insert_subtree(&mut self, node: SourceNode) {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            stack.extend(node.children());
            self.nodes.insert(node.id().to_string(), node);
        }
    }

    /// Removes the node at `id` and every node below it.
    ///
    /// Returns the removed root, or `None` if `id` was not indexed.
    pub fn remove_subtree(&mut self, id: &str) -> Option<SourceNode> {
        let root = self.nodes.remove(id)?;
        let mut stack: Vec<String> = root.child_ids().into_iter().map(String::from).collect();
        while let Some(child) = stack.pop() {
            if let Some(node) = self.nodes.remove(&child) {
                stack.extend(node.child_ids().into_iter().map(String::from));
            }
        }
        Some(root)
    }

    /// Replaces the single entry for `node.id()`, leaving descendants alone.
    pub fn replace(&mut self, node: SourceNode) -> Option<SourceNode> {
        self.nodes.insert(node.id().to_string(), node)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut SourceNode> {
        self.nodes.get_mut(id)
    }

    /// Pre-order walk of the subtree rooted at `id`.
    ///
    /// Fails with [`LensError::NodeNotFound`] if `id` is not indexed.
    pub fn walk(&self, id: &str) -> Result<Walk<'_>> {
        let root = self.nodes.get_key_value(id).ok_or_else(|| LensError::not_found(id))?;
        Ok(Walk {
            index: self,
            stack: vec![root.0.as_str()],
        })
    }
}

/// Pre-order iterator over indexed nodes.
///
/// Children are visited in their stored order: members by id, parameters in
/// declaration order.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    index: &'a NodeIndex,
    stack: Vec<&'a str>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a SourceNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            if let Some(node) = self.index.get(id) {
                self.stack.extend(node.child_ids().into_iter().rev());
                return Some(node);
            }
        }
    }
}

// ============================================================================
// Source Tree
// ============================================================================

/// A snapshot of all source units at one point in history.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    units: BTreeMap<String, SourceUnit>,
    index: NodeIndex,
}

impl PartialEq for SourceTree {
    fn eq(&self, other: &Self) -> bool {
        self.units == other.units
    }
}

impl Eq for SourceTree {}

impl SourceTree {
    /// Build a snapshot from `units`.
    ///
    /// Every unit is validated. Two units with the same path are an argument
    /// error ([`LensError::DuplicateUnit`]).
    pub fn of(units: impl IntoIterator<Item = SourceUnit>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for unit in units {
            unit.validate()?;
            if map.contains_key(unit.path()) {
                return Err(LensError::DuplicateUnit {
                    path: unit.path().to_string(),
                });
            }
            map.insert(unit.path().to_string(), unit);
        }
        let index = NodeIndex::of_units(map.values());
        Ok(SourceTree { units: map, index })
    }

    /// A snapshot without units.
    pub fn empty() -> Self {
        SourceTree::default()
    }

    pub fn get(&self, id: &str) -> Option<&SourceNode> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Typed lookup, see [`NodeIndex::get_as`].
    pub fn get_as<T: NodeType>(&self, id: &str) -> Result<&T> {
        self.index.get_as(id)
    }

    /// Units in path order.
    pub fn units(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    pub fn unit(&self, path: &str) -> Option<&SourceUnit> {
        self.units.get(path)
    }

    pub fn index(&self) -> &NodeIndex {
        &self.index
    }

    /// Pre-order walk of the whole forest, units in path order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            index: &self.index,
            stack: self.units.keys().rev().map(String::as_str).collect(),
        }
    }

    /// Pre-order walk of the subtree rooted at `id`.
    pub fn walk_from(&self, id: &str) -> Result<Walk<'_>> {
        self.index.walk(id)
    }

    /// Apply a single edit.
    ///
    /// On error the snapshot is unchanged.
    pub fn apply(&mut self, edit: &ProjectEdit) -> Result<()> {
        edit.apply_on(&mut self.index)?;
        let path = edit.source_path();
        match self.index.get(path) {
            Some(SourceNode::Unit(unit)) => {
                self.units.insert(path.to_string(), unit.clone());
            }
            _ => {
                self.units.remove(path);
            }
        }
        Ok(())
    }

    /// Apply `edits` in order, all or nothing.
    ///
    /// If any edit fails the snapshot is left exactly as it was and the
    /// first error is returned. Rollback copies only the units the batch
    /// touches.
    pub fn apply_all(&mut self, edits: &[ProjectEdit]) -> Result<()> {
        let mut saved: BTreeMap<String, Option<SourceUnit>> = BTreeMap::new();
        for edit in edits {
            let path = edit.source_path();
            saved
                .entry(path.to_string())
                .or_insert_with(|| self.units.get(path).cloned());
            if let Err(err) = self.apply(edit) {
                self.restore(saved);
                return Err(err);
            }
        }
        if !edits.is_empty() {
            debug!(edits = edits.len(), units = saved.len(), "applied edit batch");
        }
        Ok(())
    }

    /// Puts back the saved version of each unit, absent ones included.
    ///
    /// Every indexed node lives under its unit, so dropping the unit's
    /// subtree and reinserting the saved copy restores the index exactly.
    fn restore(&mut self, saved: BTreeMap<String, Option<SourceUnit>>) {
        for (path, unit) in saved {
            self.index.remove_subtree(&path);
            match unit {
                Some(unit) => {
                    self.index.insert_subtree(SourceNode::Unit(unit.clone()));
                    self.units.insert(path, unit);
                }
                None => {
                    self.units.remove(&path);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
