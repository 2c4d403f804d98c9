//! Qualified node ids.
//!
//! Every node in a snapshot is addressed by a qualified id built from its
//! ancestor chain: the unit path first, then one segment per enclosing entity,
//! joined by [`SEPARATOR`]:
//!
//! | Node | Example |
//! |------|---------|
//! | unit | `src/Main.java` |
//! | type | `src/Main.java:Main` |
//! | function | `src/Main.java:Main:getVersion(String)` |
//! | variable | `src/Main.java:Main:version` |
//! | parameter | `src/Main.java:Main:getVersion(String):name` |
//!
//! The parent of a node is always the id with its last segment stripped, so
//! no node ever stores a reference to its parent. Types and variables share
//! the name grammar; functions are told apart by their `(...)` signature.
//!
//! All validators are pure predicates. Constructors of nodes and edits call
//! them before touching any state.

use std::sync::LazyLock;

use regex::Regex;

/// Reserved separator between id segments.
pub const SEPARATOR: char = ':';

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:()/\s]+$").expect("name pattern is a valid regex")
});

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:()/\s]+\([^:()]*\)$").expect("signature pattern is a valid regex")
});

// ============================================================================
// Segment Predicates
// ============================================================================

/// Returns whether `path` is a valid source path.
///
/// Paths are relative, `/`-separated, free of whitespace, and never contain
/// empty, `.` or `..` components.
pub fn is_valid_path(path: &str) -> bool {
    if path.is_empty() || path.contains(SEPARATOR) || path.contains(char::is_whitespace) {
        return false;
    }
    let wrapped = format!("/{}/", path);
    !wrapped.contains("//") && !wrapped.contains("/./") && !wrapped.contains("/../")
}

/// Returns whether `name` is a valid type or variable name segment.
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// Returns whether `signature` is a valid function signature segment.
pub fn is_valid_signature(signature: &str) -> bool {
    SIGNATURE.is_match(signature)
}

/// Splits an id into its unit path and its entity segments.
fn split(id: &str) -> Option<(&str, Vec<&str>)> {
    let mut segments = id.split(SEPARATOR);
    let path = segments.next()?;
    if !is_valid_path(path) {
        return None;
    }
    Some((path, segments.collect()))
}

// ============================================================================
// Validators
// ============================================================================

/// Returns whether `id` is a valid source unit id (a valid path).
pub fn is_valid_unit_id(id: &str) -> bool {
    is_valid_path(id)
}

/// Returns whether `id` is a valid type id.
///
/// Types live directly in units or in other types.
pub fn is_valid_type_id(id: &str) -> bool {
    match split(id) {
        Some((_, entities)) => !entities.is_empty() && entities.iter().all(|s| is_valid_name(s)),
        None => false,
    }
}

/// Returns whether `id` is a valid function id.
///
/// Functions live directly in units or in types.
pub fn is_valid_function_id(id: &str) -> bool {
    let Some((_, entities)) = split(id) else {
        return false;
    };
    let Some((last, containers)) = entities.split_last() else {
        return false;
    };
    is_valid_signature(last) && containers.iter().all(|s| is_valid_name(s))
}

/// Returns whether `id` is a valid variable id.
///
/// Variables live in units, in types, or directly in a function as one of
/// its parameters.
pub fn is_valid_variable_id(id: &str) -> bool {
    let Some((_, entities)) = split(id) else {
        return false;
    };
    let Some((last, containers)) = entities.split_last() else {
        return false;
    };
    if !is_valid_name(last) {
        return false;
    }
    match containers.split_last() {
        Some((owner, outer)) => {
            (is_valid_name(owner) || is_valid_signature(owner))
                && outer.iter().all(|s| is_valid_name(s))
        }
        None => true,
    }
}

/// Returns whether `id` is a valid id of any entity kind.
pub fn is_valid_entity_id(id: &str) -> bool {
    is_valid_type_id(id) || is_valid_function_id(id) || is_valid_variable_id(id)
}

/// Returns whether `id` is a valid id of any node kind.
pub fn is_valid_node_id(id: &str) -> bool {
    is_valid_unit_id(id) || is_valid_entity_id(id)
}

// ============================================================================
// Builders and Derivations
// ============================================================================

/// Builds the id of a type named `name` inside `parent`.
pub fn type_id(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, name)
}

/// Builds the id of a function with `signature` inside `parent`.
pub fn function_id(parent: &str, signature: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, signature)
}

/// Builds the id of a variable named `name` inside `parent`.
pub fn variable_id(parent: &str, name: &str) -> String {
    format!("{}{}{}", parent, SEPARATOR, name)
}

/// Builds the id of the parameter `name` of `function_id`.
pub fn parameter_id(function_id: &str, name: &str) -> String {
    variable_id(function_id, name)
}

/// Returns the id of the syntactic parent of `id`, or `None` for units.
pub fn parent_id(id: &str) -> Option<&str> {
    id.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Returns the last segment of `id` (the path for units).
pub fn simple_name(id: &str) -> &str {
    id.rsplit_once(SEPARATOR).map_or(id, |(_, name)| name)
}

/// Returns the path of the unit that contains `id`.
pub fn source_path(id: &str) -> &str {
    id.split_once(SEPARATOR).map_or(id, |(path, _)| path)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod path_tests {
        use super::*;

        #[test]
        fn relative_paths_are_valid() {
            assert!(is_valid_path("src/Main.java"));
            assert!(is_valid_path("Main.java"));
            assert!(is_valid_path("docs/README.md"));
        }

        #[test]
        fn malformed_paths_are_invalid() {
            assert!(!is_valid_path(""));
            assert!(!is_valid_path("/src/Main.java"));
            assert!(!is_valid_path("src/"));
            assert!(!is_valid_path("src//Main.java"));
            assert!(!is_valid_path("./Main.java"));
            assert!(!is_valid_path("src/../Main.java"));
            assert!(!is_valid_path("res:Main.java"));
            assert!(!is_valid_path("docs/My File.md"));
        }
    }

    mod validator_tests {
        use super::*;

        #[test]
        fn unit_ids() {
            assert!(is_valid_unit_id("src/Test.java"));
            assert!(!is_valid_unit_id("src/Test.java:Test"));
        }

        #[test]
        fn type_ids() {
            assert!(is_valid_type_id("src/Test.java:Test"));
            assert!(is_valid_type_id("src/Test.java:Test:Inner"));
            assert!(!is_valid_type_id("src/Test.java"));
            assert!(!is_valid_type_id("src/Test.java:getVersion()"));
            assert!(!is_valid_type_id("src/Test.java:getVersion():Inner"));
            assert!(!is_valid_type_id("src/Test.java:/"));
            assert!(!is_valid_type_id("src/Test.java:"));
        }

        #[test]
        fn function_ids() {
            assert!(is_valid_function_id("src/Test.java:getVersion()"));
            assert!(is_valid_function_id("src/Test.java:Test:getVersion(String)"));
            assert!(is_valid_function_id("src/Test.java:Test:compare(int, List<String>)"));
            assert!(!is_valid_function_id("src/Test.java:Test"));
            assert!(!is_valid_function_id("src/Test.java:f():g()"));
            assert!(!is_valid_function_id("src/Test.java:f(a:b)"));
        }

        #[test]
        fn variable_ids() {
            assert!(is_valid_variable_id("src/Test.java:DEBUG"));
            assert!(is_valid_variable_id("src/Test.java:Test:version"));
            assert!(is_valid_variable_id("src/Test.java:Test:getVersion(String):name"));
            assert!(!is_valid_variable_id("src/Test.java:f():g():name"));
            assert!(!is_valid_variable_id("src/Test.java:f()"));
            assert!(!is_valid_variable_id("src/Test.java"));
        }

        #[test]
        fn node_ids() {
            assert!(is_valid_node_id("src/Test.java"));
            assert!(is_valid_node_id("src/Test.java:Test:getVersion(String):name"));
            assert!(!is_valid_node_id("src/Test.java:/"));
            assert!(!is_valid_node_id(""));
        }
    }

    mod derivation_tests {
        use super::*;

        #[test]
        fn builders_compose_ids() {
            let ty = type_id("src/Main.java", "Main");
            let function = function_id(&ty, "getVersion(String)");
            let parameter = parameter_id(&function, "name");
            assert_eq!(parameter, "src/Main.java:Main:getVersion(String):name");
            assert!(is_valid_variable_id(&parameter));
        }

        #[test]
        fn parent_is_prefix() {
            let id = "src/Main.java:Main:getVersion(String):name";
            assert_eq!(parent_id(id), Some("src/Main.java:Main:getVersion(String)"));
            assert_eq!(parent_id("src/Main.java:Main"), Some("src/Main.java"));
            assert_eq!(parent_id("src/Main.java"), None);
        }

        #[test]
        fn simple_name_and_source_path() {
            let id = "src/Main.java:Main:getVersion(String)";
            assert_eq!(simple_name(id), "getVersion(String)");
            assert_eq!(source_path(id), "src/Main.java");
            assert_eq!(simple_name("src/Main.java"), "src/Main.java");
            assert_eq!(source_path("src/Main.java"), "src/Main.java");
        }
    }
}
