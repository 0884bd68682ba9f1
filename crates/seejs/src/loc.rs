//! Source locations, threaded from the lexer through to tracebacks.

use std::{fmt, rc::Rc};

/// A location in a source unit: filename plus 1-based line number.
///
/// Column information is deliberately not tracked -- the spec only asks
/// for "a source location string prefix" on `SyntaxError` and for
/// traceback frames recording "call location"; both only need a line.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub filename: Rc<str>,
    pub line: u32,
}

impl CodeLoc {
    pub fn new(filename: Rc<str>, line: u32) -> Self {
        Self { filename, line }
    }

    pub fn unknown() -> Self {
        Self { filename: Rc::from("<unknown>"), line: 0 }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}
