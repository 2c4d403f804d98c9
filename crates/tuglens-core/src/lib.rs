//! Core infrastructure for tuglens.
//!
//! This crate models the structural history of a source repository:
//! - Qualified node ids and their grammar
//! - Source node model (units, types, functions, variables)
//! - Set and list edit primitives with their diffs
//! - Indexed snapshots and structural edits with ancestor propagation
//! - Structural diff between snapshots
//! - Parser and version-control capability traits
//! - History reconstruction as a stream of transactions
//! - Head-revision queries over a repository
//! - Error types, error codes and configuration

pub mod builder;
pub mod config;
pub mod diff;
pub mod error;
pub mod history;
pub mod id;
pub mod list_edit;
pub mod model;
pub mod parsing;
pub mod project_edit;
pub mod repository;
pub mod set_edit;
pub mod tree;
pub mod versioning;

pub use diff::{diff, diff_units};
pub use error::{ErrorCode, LensError, Result, VcsError};
pub use model::{Function, NodeKind, SourceEntity, SourceNode, SourceUnit, Type, Variable};
pub use project_edit::ProjectEdit;
pub use repository::Repository;
pub use tree::SourceTree;
