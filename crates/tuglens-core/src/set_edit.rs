//! Edits on unordered collections.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};

/// An atomic change applied to a set of elements.
///
/// Edits on distinct elements commute, so the order of a diff does not
/// matter for the result. It is still deterministic: additions first, then
/// removals, each in ascending element order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetEdit<T> {
    /// Add an element that is not yet in the set.
    Add(T),
    /// Remove an element that is in the set.
    Remove(T),
}

impl<T: Ord + Clone + fmt::Debug> SetEdit<T> {
    /// Applies this edit to `subject` in place.
    ///
    /// Adding an element that is already present, or removing one that is
    /// missing, is a state error and leaves `subject` unchanged.
    pub fn apply_on(&self, subject: &mut BTreeSet<T>) -> Result<()> {
        match self {
            SetEdit::Add(value) => {
                if !subject.insert(value.clone()) {
                    return Err(LensError::DuplicateElement {
                        value: format!("{:?}", value),
                    });
                }
            }
            SetEdit::Remove(value) => {
                if !subject.remove(value) {
                    return Err(LensError::MissingElement {
                        value: format!("{:?}", value),
                    });
                }
            }
        }
        Ok(())
    }

    /// Applies `edits` in order to a copy of `set` and returns the result.
    pub fn apply(set: &BTreeSet<T>, edits: &[SetEdit<T>]) -> Result<BTreeSet<T>> {
        let mut result = set.clone();
        for edit in edits {
            edit.apply_on(&mut result)?;
        }
        Ok(result)
    }

    /// Returns the edits that turn `src` into `dst`.
    pub fn diff(src: &BTreeSet<T>, dst: &BTreeSet<T>) -> Vec<SetEdit<T>> {
        let added = dst.difference(src).cloned().map(SetEdit::Add);
        let removed = src.difference(dst).cloned().map(SetEdit::Remove);
        added.chain(removed).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
