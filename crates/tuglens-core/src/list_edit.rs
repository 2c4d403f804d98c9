//! Edits on ordered collections and the edit-distance diff between lists.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};

/// An atomic change applied to a list of elements.
///
/// Indices refer to the list as it is when the edit is applied, so a
/// sequence of edits must be replayed in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListEdit<T> {
    /// Insert `value` so that it ends up at `index`.
    Add { index: usize, value: T },
    /// Remove the element at `index`.
    Remove { index: usize },
    /// Overwrite the element at `index` with `value`.
    Replace { index: usize, value: T },
}

impl<T> ListEdit<T> {
    /// The index this edit touches.
    pub fn index(&self) -> usize {
        match self {
            ListEdit::Add { index, .. }
            | ListEdit::Remove { index }
            | ListEdit::Replace { index, .. } => *index,
        }
    }
}

impl<T: Clone + Eq + Hash> ListEdit<T> {
    /// Applies this edit to `subject` in place.
    ///
    /// Fails with [`LensError::IndexOutOfBounds`] (leaving `subject`
    /// untouched) if the index is out of the list's current bounds.
    pub fn apply_on(&self, subject: &mut Vec<T>) -> Result<()> {
        let len = subject.len();
        match self {
            ListEdit::Add { index, value } => {
                if *index > len {
                    return Err(LensError::IndexOutOfBounds { index: *index, len });
                }
                subject.insert(*index, value.clone());
            }
            ListEdit::Remove { index } => {
                if *index >= len {
                    return Err(LensError::IndexOutOfBounds { index: *index, len });
                }
                subject.remove(*index);
            }
            ListEdit::Replace { index, value } => match subject.get_mut(*index) {
                Some(slot) => *slot = value.clone(),
                None => return Err(LensError::IndexOutOfBounds { index: *index, len }),
            },
        }
        Ok(())
    }

    /// Applies `edits` in order to a copy of `list` and returns the result.
    pub fn apply(list: &[T], edits: &[ListEdit<T>]) -> Result<Vec<T>> {
        let mut result = list.to_vec();
        for edit in edits {
            edit.apply_on(&mut result)?;
        }
        Ok(result)
    }

    /// Returns a minimal sequence of `Add`/`Remove` edits turning `src` into
    /// `dst`.
    ///
    /// Classic insert/delete edit distance over element equality, computed
    /// in `O(|src| * |dst|)` time and space. The script is emitted while
    /// backtracking from the end of both lists, so every edit only touches
    /// positions that earlier edits in the script have not shifted.
    pub fn diff(src: &[T], dst: &[T]) -> Vec<ListEdit<T>> {
        let mut codes: HashMap<&T, usize> = HashMap::new();
        for value in src.iter().chain(dst) {
            let next = codes.len();
            codes.entry(value).or_insert(next);
        }
        let a: Vec<usize> = src.iter().map(|v| codes[v]).collect();
        let b: Vec<usize> = dst.iter().map(|v| codes[v]).collect();
        let (n, m) = (a.len(), b.len());

        let mut dp = vec![vec![0usize; m + 1]; n + 1];
        for (j, cell) in dp[0].iter_mut().enumerate() {
            *cell = j;
        }
        for i in 1..=n {
            dp[i][0] = i;
            for j in 1..=m {
                dp[i][j] = if a[i - 1] == b[j - 1] {
                    dp[i - 1][j - 1]
                } else {
                    1 + dp[i - 1][j].min(dp[i][j - 1])
                };
            }
        }

        let mut edits = Vec::with_capacity(dp[n][m]);
        let (mut i, mut j) = (n, m);
        while i > 0 || j > 0 {
            if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
                i -= 1;
                j -= 1;
            } else if i > 0 && dp[i][j] == dp[i - 1][j] + 1 {
                edits.push(ListEdit::Remove { index: i - 1 });
                i -= 1;
            } else {
                edits.push(ListEdit::Add {
                    index: i,
                    value: dst[j - 1].clone(),
                });
                j -= 1;
            }
        }
        edits
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn assert_round_trip(src: &str, dst: &str) {
        let (src, dst) = (chars(src), chars(dst));
        let edits = ListEdit::diff(&src, &dst);
        assert_eq!(
            ListEdit::apply(&src, &edits).unwrap(),
            dst,
            "edits {:?} don't turn {:?} into {:?}",
            edits,
            src,
            dst
        );
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn add_inserts_at_index() {
            let result = ListEdit::apply(
                &chars("ac"),
                &[ListEdit::Add {
                    index: 1,
                    value: 'b',
                }],
            )
            .unwrap();
            assert_eq!(result, chars("abc"));
        }

        #[test]
        fn add_at_end_is_allowed() {
            let result = ListEdit::apply(
                &chars("ab"),
                &[ListEdit::Add {
                    index: 2,
                    value: 'c',
                }],
            )
            .unwrap();
            assert_eq!(result, chars("abc"));
        }

        #[test]
        fn remove_and_replace() {
            let result = ListEdit::apply(
                &chars("abc"),
                &[
                    ListEdit::Remove { index: 0 },
                    ListEdit::Replace {
                        index: 1,
                        value: 'z',
                    },
                ],
            )
            .unwrap();
            assert_eq!(result, chars("bz"));
        }

        #[test]
        fn add_out_of_bounds_is_state_error() {
            let err = ListEdit::apply(
                &chars("a"),
                &[ListEdit::Add {
                    index: 2,
                    value: 'b',
                }],
            )
            .unwrap_err();
            assert!(err.is_state_error());
            assert!(matches!(
                err,
                LensError::IndexOutOfBounds { index: 2, len: 1 }
            ));
        }

        #[test]
        fn remove_out_of_bounds_is_state_error() {
            let err =
                ListEdit::<char>::apply(&[], &[ListEdit::Remove { index: 0 }]).unwrap_err();
            assert!(matches!(
                err,
                LensError::IndexOutOfBounds { index: 0, len: 0 }
            ));
        }

        #[test]
        fn index_valid_at_construction_can_fail_later_in_sequence() {
            let err = ListEdit::apply(
                &chars("ab"),
                &[ListEdit::Remove { index: 1 }, ListEdit::Remove { index: 1 }],
            )
            .unwrap_err();
            assert!(matches!(
                err,
                LensError::IndexOutOfBounds { index: 1, len: 1 }
            ));
        }
    }

    mod diff_tests {
        use super::*;
        use proptest::prelude::*;

        #[test]
        fn rename_single_element_removes_then_adds() {
            let src = vec!["name".to_string()];
            let dst = vec!["arg".to_string()];
            assert_eq!(
                ListEdit::diff(&src, &dst),
                vec![
                    ListEdit::Remove { index: 0 },
                    ListEdit::Add {
                        index: 0,
                        value: "arg".to_string(),
                    },
                ]
            );
        }

        #[test]
        fn equal_lists_have_empty_diff() {
            assert!(ListEdit::diff(&chars("abc"), &chars("abc")).is_empty());
            assert!(ListEdit::<char>::diff(&[], &[]).is_empty());
        }

        #[test]
        fn diff_is_minimal() {
            // One insertion and one deletion.
            assert_eq!(ListEdit::diff(&chars("abcd"), &chars("abxc")).len(), 2);
            assert_eq!(ListEdit::diff(&chars("abc"), &chars("ac")).len(), 1);
            assert_eq!(ListEdit::diff(&chars(""), &chars("xyz")).len(), 3);
        }

        #[test]
        fn round_trips_on_assorted_pairs() {
            let pairs = [
                ("", ""),
                ("", "abc"),
                ("abc", ""),
                ("abc", "abc"),
                ("abc", "cba"),
                ("kitten", "sitting"),
                ("aaaa", "aa"),
                ("abab", "baba"),
                ("{\n  return x;\n}", "{\n  return y;\n}\n"),
                ("abcdefgh", "hgfedcba"),
            ];
            for (src, dst) in pairs {
                assert_round_trip(src, dst);
                assert_round_trip(dst, src);
            }
        }

        proptest! {
            #[test]
            fn round_trips_on_generated_sequences(
                src in prop::collection::vec(0u8..4, 0..12),
                dst in prop::collection::vec(0u8..4, 0..12),
            ) {
                let edits = ListEdit::diff(&src, &dst);
                let no_replace = edits.iter().all(|e| !matches!(e, ListEdit::Replace { .. }));
                prop_assert!(no_replace);
                prop_assert_eq!(ListEdit::apply(&src, &edits).unwrap(), dst);
            }
        }
    }
}
