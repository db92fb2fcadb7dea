use std::fmt;
use std::sync::Arc;

/// Source position attached to every IR node, used only for diagnostics.
///
/// Positions are produced by the (external) parser; the evaluation core
/// copies them onto every node it creates so that a late error can still
/// point at the source line that caused it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SrcPos {
    /// Source file name, shared between all nodes from the same file.
    pub file: Option<Arc<str>>,
    /// 1-based line number; 0 means "no position".
    pub line: u32,
}

impl SrcPos {
    /// Creates a position for a named file and line.
    pub fn new(file: impl Into<Arc<str>>, line: u32) -> Self {
        SrcPos {
            file: Some(file.into()),
            line,
        }
    }

    /// The empty position, used for synthesized nodes (command-line
    /// constants, evaluator-created literals with no better origin).
    pub fn none() -> Self {
        SrcPos::default()
    }
}

impl fmt::Display for SrcPos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.file {
            Some(file) if self.line > 0 => write!(f, "{}:{}", file, self.line),
            Some(file) => write!(f, "{}", file),
            None => write!(f, "<no-file>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SrcPos::new("board.dts", 12).to_string(), "board.dts:12");
        assert_eq!(SrcPos::none().to_string(), "<no-file>");
    }
}
