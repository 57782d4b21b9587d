/// Source location tracking.
///
/// Every symbol the parser produces carries a [`Position`] recording the
/// file it came from and where in that file it appeared. The file name is
/// reference-counted because a single parse shares it across every token.
use std::rc::Rc;

/// A single position in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Name of the source file (usually a path).
    pub file: Rc<str>,
    /// Line number (1-based).
    pub line: u32,
    /// Column number (1-based).
    pub column: u32,
}

impl Position {
    pub fn new(file: Rc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// The very beginning of a source file.
    pub fn origin(file: impl Into<Rc<str>>) -> Self {
        Self {
            file: file.into(),
            line: 1,
            column: 1,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
