use serde::{Deserialize, Serialize};

use std::fmt;
use std::sync::Arc;

/// The display name used for scripts that were compiled without a source name
pub const UNNAMED_SOURCE: &str = "<script>";

/// Points at a character in a script. Lines and columns start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// name of the script, usually a file path
    pub source: Option<Arc<str>>,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(source: Option<Arc<str>>, line: usize, column: usize) -> Self {
        Self {
            source,
            line,
            column,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.as_deref().unwrap_or(UNNAMED_SOURCE)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_name(), self.line, self.column)
    }
}

/// The compact form of a [`Location`] that is stored next to every emitted instruction.
/// `source` indexes into [`CodeSources`], so the source name is stored only once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[display(fmt = "#{}:{}:{}", source, line, column)]
pub struct CodeLocation {
    pub source: usize,
    pub line: usize,
    pub column: usize,
}

/// Collects the distinct scripts instructions originate from
#[derive(Debug, Clone, Default)]
pub struct CodeSources {
    names: Vec<String>,
}

impl CodeSources {
    /// translates a compile time location, registering its source if it hasn't been seen yet
    pub fn code_location(&mut self, location: &Location) -> CodeLocation {
        let name = location.source_name();
        let source = match self.names.iter().position(|n| n == name) {
            Some(idx) => idx,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        };
        CodeLocation {
            source,
            line: location.line,
            column: location.column,
        }
    }

    /// the inverse of `code_location`
    pub fn location(&self, code_location: &CodeLocation) -> Location {
        let source = self
            .names
            .get(code_location.source)
            .filter(|name| name.as_str() != UNNAMED_SOURCE)
            .map(|name| Arc::from(name.as_str()));
        Location::new(source, code_location.line, code_location.column)
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}
