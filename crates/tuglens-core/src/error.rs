//! Error types and error code constants for tuglens.
//!
//! This module provides a unified error type (`LensError`) for the node model,
//! the edit engine and history replay, plus `VcsError` for failures reported by
//! a version-control capability.
//!
//! ## Error Classes
//!
//! Errors fall into two classes that callers can rely on:
//! - **Argument errors** (malformed id, duplicate unit path, ...) are raised by
//!   constructors and validators before any state is touched.
//! - **State errors** (missing node, wrong kind, index out of bounds, ...) are
//!   raised while an edit is being applied.
//!
//! Capability and configuration failures get their own codes so that a
//! frontend can map them to distinct exit codes:
//! - `2`: Invalid arguments
//! - `3`: Invalid state
//! - `4`: Capability failure (version control, parser, I/O)
//! - `5`: Configuration error

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::NodeKind;

// ============================================================================
// Error Codes
// ============================================================================

/// Stable error codes for tuglens errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid arguments from caller (malformed id, duplicate path).
    InvalidArgument = 2,
    /// The snapshot is not in a state where the operation can proceed.
    InvalidState = 3,
    /// A version-control or parser capability failed.
    Capability = 4,
    /// Configuration could not be read or parsed.
    Config = 5,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Version Control Errors
// ============================================================================

/// Failure reported by a version-control capability.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Spawning or talking to the subprocess failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The subprocess terminated abnormally.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    Subprocess {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The subprocess did not finish in time and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The subprocess output could not be interpreted.
    #[error("malformed output: {message}")]
    Malformed { message: String },

    /// The requested revision does not exist.
    #[error("unknown revision '{id}'")]
    UnknownRevision { id: String },
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the tuglens core.
#[derive(Debug, Error)]
pub enum LensError {
    // === Argument errors ===
    /// An id does not follow the grammar for its kind.
    #[error("invalid {kind} id '{id}'")]
    InvalidId { kind: NodeKind, id: String },

    /// Generic invalid argument.
    #[error("invalid arguments: {message}")]
    InvalidArgument { message: String },

    /// Two units share the same path.
    #[error("duplicate source unit '{path}'")]
    DuplicateUnit { path: String },

    /// Two children of the same node share an id.
    #[error("node '{parent}' contains duplicate child '{id}'")]
    DuplicateId { parent: String, id: String },

    /// Two nodes that must share an id do not.
    #[error("can't compare node '{before}' with node '{after}'")]
    IdMismatch { before: String, after: String },

    // === State errors ===
    /// No node exists at the requested id.
    #[error("node '{id}' doesn't exist")]
    NodeNotFound { id: String },

    /// A node already exists at the id being added.
    #[error("node '{id}' already exists")]
    NodeExists { id: String },

    /// The node at an id is not of the requested kind.
    #[error("node '{id}' is a {actual}, expected a {expected}")]
    WrongKind {
        id: String,
        expected: NodeKind,
        actual: NodeKind,
    },

    /// The syntactic parent of a node is missing from the index.
    #[error("parent '{parent}' of node '{id}' doesn't exist")]
    ParentNotFound { id: String, parent: String },

    /// The parent exists but can't contain a child of this kind.
    #[error("{parent_kind} '{parent}' can't contain {child_kind} '{id}'")]
    InvalidParent {
        id: String,
        parent: String,
        parent_kind: NodeKind,
        child_kind: NodeKind,
    },

    /// A list edit index is out of bounds for the list it is applied to.
    #[error("index {index} is out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A set edit adds an element that is already present.
    #[error("set already contains {value}")]
    DuplicateElement { value: String },

    /// A set edit removes an element that is not present.
    #[error("set doesn't contain {value}")]
    MissingElement { value: String },

    /// A parameter name doesn't resolve to a variable under the function.
    #[error("function '{function}' has no parameter '{name}'")]
    UnresolvedParameter { function: String, name: String },

    /// Parameter edits produced a list that doesn't match the live parameters.
    #[error("parameter edits for '{function}' don't preserve its parameters: {message}")]
    ParameterMismatch { function: String, message: String },

    /// A parser returned a unit for a different path.
    #[error("parsed unit '{actual}' doesn't match requested path '{expected}'")]
    UnitPathMismatch { expected: String, actual: String },

    // === Capability errors ===
    /// The version-control capability failed.
    #[error("version control error: {0}")]
    Vcs(#[from] VcsError),

    // === Configuration errors ===
    /// Configuration could not be read or parsed.
    #[error("config error at {path}: {message}")]
    Config { path: String, message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&LensError> for ErrorCode {
    fn from(err: &LensError) -> Self {
        match err {
            LensError::InvalidId { .. }
            | LensError::InvalidArgument { .. }
            | LensError::DuplicateUnit { .. }
            | LensError::DuplicateId { .. }
            | LensError::IdMismatch { .. } => ErrorCode::InvalidArgument,
            LensError::NodeNotFound { .. }
            | LensError::NodeExists { .. }
            | LensError::WrongKind { .. }
            | LensError::ParentNotFound { .. }
            | LensError::InvalidParent { .. }
            | LensError::IndexOutOfBounds { .. }
            | LensError::DuplicateElement { .. }
            | LensError::MissingElement { .. }
            | LensError::UnresolvedParameter { .. }
            | LensError::ParameterMismatch { .. }
            | LensError::UnitPathMismatch { .. } => ErrorCode::InvalidState,
            LensError::Vcs(_) => ErrorCode::Capability,
            LensError::Config { .. } => ErrorCode::Config,
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl LensError {
    /// Create an invalid id error.
    pub fn invalid_id(kind: NodeKind, id: impl Into<String>) -> Self {
        LensError::InvalidId {
            kind,
            id: id.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        LensError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a node not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        LensError::NodeNotFound { id: id.into() }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }

    /// Whether this error was raised before any mutation because of bad input.
    pub fn is_argument_error(&self) -> bool {
        self.error_code() == ErrorCode::InvalidArgument
    }

    /// Whether this error was raised while applying an edit.
    pub fn is_state_error(&self) -> bool {
        self.error_code() == ErrorCode::InvalidState
    }
}

/// Result alias used across the core.
pub type Result<T, E = LensError> = std::result::Result<T, E>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn invalid_id_maps_to_invalid_argument() {
            let err = LensError::invalid_id(NodeKind::Type, "src/Main.java:/");
            assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
            assert!(err.is_argument_error());
            assert!(!err.is_state_error());
        }

        #[test]
        fn duplicate_unit_maps_to_invalid_argument() {
            let err = LensError::DuplicateUnit {
                path: "src/Main.java".to_string(),
            };
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn node_not_found_maps_to_invalid_state() {
            let err = LensError::not_found("src/Main.java:Main");
            assert_eq!(err.error_code(), ErrorCode::InvalidState);
            assert!(err.is_state_error());
        }

        #[test]
        fn index_out_of_bounds_maps_to_invalid_state() {
            let err = LensError::IndexOutOfBounds { index: 3, len: 1 };
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn vcs_error_maps_to_capability() {
            let err = LensError::from(VcsError::UnknownRevision {
                id: "abc".to_string(),
            });
            assert_eq!(err.error_code(), ErrorCode::Capability);
            assert!(!err.is_argument_error());
        }

        #[test]
        fn config_error_maps_to_config() {
            let err = LensError::Config {
                path: "tuglens.toml".to_string(),
                message: "bad".to_string(),
            };
            assert_eq!(err.error_code().code(), 5);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn wrong_kind_display() {
            let err = LensError::WrongKind {
                id: "src/A.java:a".to_string(),
                expected: NodeKind::Type,
                actual: NodeKind::Variable,
            };
            assert_eq!(
                err.to_string(),
                "node 'src/A.java:a' is a variable, expected a type"
            );
        }

        #[test]
        fn index_out_of_bounds_display() {
            let err = LensError::IndexOutOfBounds { index: 2, len: 1 };
            assert_eq!(
                err.to_string(),
                "index 2 is out of bounds for list of length 1"
            );
        }

        #[test]
        fn error_code_display_shows_code() {
            assert_eq!(format!("{}", ErrorCode::InvalidArgument), "2");
            assert_eq!(format!("{}", ErrorCode::Capability), "4");
        }
    }
}
