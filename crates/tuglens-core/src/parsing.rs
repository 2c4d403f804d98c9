//! Parser capability.
//!
//! Language front ends turn the raw content of a file into a [`SourceUnit`].
//! The core never parses source code itself; it only talks to the
//! [`Parser`] trait. [`JsonUnitParser`] reads units that an external front
//! end already serialized as JSON, and [`ParserRegistry`] dispatches a path
//! to the first parser that accepts it.

use serde_json::Error as JsonError;
use tracing::debug;

use crate::error::{LensError, Result};
use crate::id;
use crate::model::SourceUnit;

/// Result of parsing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The file was parsed into a unit.
    Parsed(SourceUnit),
    /// The file content is not valid for the language.
    SyntaxError,
}

/// A language front end.
///
/// # Example Implementation
///
/// ```
/// use tuglens_core::error::Result;
/// use tuglens_core::model::SourceUnit;
/// use tuglens_core::parsing::{ParseOutcome, Parser};
///
/// struct EmptyParser;
///
/// impl Parser for EmptyParser {
///     fn can_parse(&self, path: &str) -> bool {
///         path.ends_with(".txt")
///     }
///
///     fn parse(&self, path: &str, _raw: &str) -> Result<ParseOutcome> {
///         Ok(ParseOutcome::Parsed(SourceUnit::empty(path)?))
///     }
/// }
/// ```
pub trait Parser {
    /// Check if this parser handles files at `path`.
    ///
    /// Typically checks the file extension.
    fn can_parse(&self, path: &str) -> bool;

    /// Parse `raw`, the content of the file at `path`.
    ///
    /// Malformed content is reported as [`ParseOutcome::SyntaxError`], not as
    /// an error. Errors are reserved for failures of the parser itself.
    fn parse(&self, path: &str, raw: &str) -> Result<ParseOutcome>;
}

/// Parse `raw` with `parser`, checking the contract on both ends.
///
/// Fails with an argument error if `path` is not a valid unit id and with
/// [`LensError::UnitPathMismatch`] if the parser returns a unit for another
/// path.
pub fn parse_source(parser: &dyn Parser, path: &str, raw: &str) -> Result<ParseOutcome> {
    if !id::is_valid_path(path) {
        return Err(LensError::invalid_args(format!("invalid source path '{}'", path)));
    }
    let outcome = parser.parse(path, raw)?;
    if let ParseOutcome::Parsed(unit) = &outcome {
        if unit.path() != path {
            return Err(LensError::UnitPathMismatch {
                expected: path.to_string(),
                actual: unit.path().to_string(),
            });
        }
    }
    Ok(outcome)
}

/// Parse raw file bytes with `parser`.
///
/// Content that isn't UTF-8 is reported as a syntax error.
pub fn parse_content(parser: &dyn Parser, path: &str, bytes: Vec<u8>) -> Result<ParseOutcome> {
    match String::from_utf8(bytes) {
        Ok(raw) => parse_source(parser, path, &raw),
        Err(_) => {
            debug!(path, "file content is not UTF-8");
            Ok(ParseOutcome::SyntaxError)
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// An ordered list of parsers, itself usable as a [`Parser`].
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        ParserRegistry::default()
    }

    /// Append `parser`; earlier parsers win for paths both accept.
    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    fn find(&self, path: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(path))
            .map(|p| p.as_ref())
    }
}

impl Parser for ParserRegistry {
    fn can_parse(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn parse(&self, path: &str, raw: &str) -> Result<ParseOutcome> {
        match self.find(path) {
            Some(parser) => parser.parse(path, raw),
            None => Err(LensError::invalid_args(format!("no parser accepts '{}'", path))),
        }
    }
}

// ============================================================================
// JSON Units
// ============================================================================

/// Reads units serialized as JSON.
///
/// Files are accepted by extension. The content must be a serialized
/// [`SourceUnit`]; anything that doesn't deserialize or validate is a
/// syntax error.
#[derive(Debug, Clone)]
pub struct JsonUnitParser {
    extension: String,
}

impl Default for JsonUnitParser {
    fn default() -> Self {
        JsonUnitParser::with_extension("json")
    }
}

impl JsonUnitParser {
    /// Accept files ending with `.{extension}`.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        JsonUnitParser {
            extension: extension.into(),
        }
    }

    fn decode(raw: &str) -> Result<SourceUnit, JsonError> {
        serde_json::from_str(raw)
    }
}

impl Parser for JsonUnitParser {
    fn can_parse(&self, path: &str) -> bool {
        path.rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && !stem.ends_with('/') && ext == self.extension)
    }

    fn parse(&self, path: &str, raw: &str) -> Result<ParseOutcome> {
        // Node constructors run during deserialization, so an ill-formed
        // unit surfaces here as a decode error.
        match Self::decode(raw) {
            Ok(unit) => Ok(ParseOutcome::Parsed(unit)),
            Err(err) => {
                debug!(path, error = %err, "json unit doesn't deserialize");
                Ok(ParseOutcome::SyntaxError)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> JsonUnitParser {
        JsonUnitParser::with_extension("mock")
    }

    mod json_parser_tests {
        use super::*;

        #[test]
        fn accepts_by_extension() {
            assert!(parser().can_parse("Test.mock"));
            assert!(parser().can_parse("src/Test.mock"));
            assert!(!parser().can_parse("file.mp3"));
            assert!(!parser().can_parse("mock"));
            assert!(!parser().can_parse("src/.mock"));
            assert!(JsonUnitParser::default().can_parse("a.json"));
        }

        #[test]
        fn parses_serialized_unit() {
            let raw = r#"{
                "path": "src/Test.mock",
                "entities": [
                    {"kind": "variable", "id": "src/Test.mock:x", "initializer": ["1"]}
                ]
            }"#;
            let outcome = parser().parse("src/Test.mock", raw).unwrap();
            let ParseOutcome::Parsed(unit) = outcome else {
                panic!("expected a parsed unit");
            };
            assert_eq!(unit.entities().len(), 1);
        }

        #[test]
        fn malformed_json_is_syntax_error() {
            let outcome = parser().parse("res.mock", r#"{"invalid":2"#).unwrap();
            assert_eq!(outcome, ParseOutcome::SyntaxError);
        }

        #[test]
        fn invalid_unit_is_syntax_error() {
            let raw = r#"{"path": "src/Test.mock", "entities": [{"kind": "variable", "id": "src/Other.mock:x"}]}"#;
            let outcome = parser().parse("src/Test.mock", raw).unwrap();
            assert_eq!(outcome, ParseOutcome::SyntaxError);
        }
    }

    mod parse_source_tests {
        use super::*;

        #[test]
        fn invalid_path_is_argument_error() {
            let raw = r#"{"path": "res:/Test.mock"}"#;
            let err = parse_source(&parser(), "res:/Test.mock", raw).unwrap_err();
            assert!(err.is_argument_error());
        }

        #[test]
        fn different_path_is_state_error() {
            let raw = r#"{"path": "Main.mock"}"#;
            let err = parse_source(&parser(), "Test.mock", raw).unwrap_err();
            assert!(err.is_state_error());
            assert!(matches!(err, LensError::UnitPathMismatch { .. }));
        }

        #[test]
        fn syntax_error_passes_through() {
            let outcome = parse_source(&parser(), "Test.mock", "{").unwrap();
            assert_eq!(outcome, ParseOutcome::SyntaxError);
        }

        #[test]
        fn undecodable_bytes_are_syntax_error() {
            let outcome = parse_content(&parser(), "Test.mock", vec![0xff, 0xfe]).unwrap();
            assert_eq!(outcome, ParseOutcome::SyntaxError);
            let outcome = parse_content(&parser(), "Test.mock", br#"{"path": "Test.mock"}"#.to_vec()).unwrap();
            assert!(matches!(outcome, ParseOutcome::Parsed(_)));
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn first_accepting_parser_wins() {
            let registry = ParserRegistry::new()
                .with_parser(JsonUnitParser::with_extension("mock"))
                .with_parser(JsonUnitParser::default());
            assert_eq!(registry.len(), 2);
            assert!(registry.can_parse("a.mock"));
            assert!(registry.can_parse("a.json"));
            assert!(!registry.can_parse("a.java"));

            let outcome = registry.parse("a.json", r#"{"path": "a.json"}"#).unwrap();
            assert!(matches!(outcome, ParseOutcome::Parsed(_)));
        }

        #[test]
        fn unknown_path_is_argument_error() {
            let err = ParserRegistry::new().parse("a.java", "").unwrap_err();
            assert!(err.is_argument_error());
        }
    }
}
