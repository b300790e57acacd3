//! Source-position information attached to parse errors.
//!
//! When a document is fetched and fails to parse, callers want to see the
//! line/column the parser choked on rather than just "invalid YAML". This is
//! populated from `serde_yaml`'s own error when the `yaml` feature is
//! enabled, and left empty for JSON parse failures (`serde_json`'s error
//! already carries line/column in its `Display` output, so it is not
//! duplicated here).

use std::fmt;

/// A 1-indexed line/column pair in a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl Location {
    #[must_use]
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
        }
    }

    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            line: None,
            column: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "line {line}, column {column}"),
            _ => write!(f, "unknown location"),
        }
    }
}

#[cfg(feature = "yaml")]
impl From<&serde_yaml::Location> for Location {
    fn from(loc: &serde_yaml::Location) -> Self {
        Self::new(loc.line(), loc.column())
    }
}
