//! Error types for the Forgescript compiler core

use thiserror::Error;

/// Forgescript compiler and decompiler errors
///
/// Every kind aborts only the code entry that raised it; batch drivers decide
/// whether one failure halts the batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Lexical error anchored at a raw text offset
    ///
    /// **Triggered by:** Invalid characters, unterminated strings, malformed
    /// numeric literals in the source text.
    #[error("{message}")]
    Lex {
        /// Byte offset into the source text where the error occurred
        position: usize,
        /// Error description
        message: String,
    },

    /// Parse error with an optional nearby-token anchor
    ///
    /// The position is absent when the parser fails without a token to point
    /// at (for example, unexpected end of input).
    #[error("{message}")]
    Parse {
        /// Byte offset of the nearby token, if one was available
        position: Option<usize>,
        /// Error description
        message: String,
    },

    /// Semantic or code-generation failure
    ///
    /// Wraps resolution failures and invariant violations discovered after
    /// parsing. Carries no position; duplicate-declaration checks return
    /// booleans instead of raising this, leaving the decision to the caller.
    #[error("{message}")]
    Compiler {
        /// Error description
        message: String,
        /// Inner cause, if this failure wraps another
        cause: Option<Box<Error>>,
    },

    /// Annotation configuration error
    ///
    /// **Triggered by:** Unresolvable named type references, cyclic type
    /// definitions, malformed composites, duplicate keys. Detected eagerly at
    /// registry construction, never at resolution time.
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
    },
}

impl Error {
    /// Creates a lex error at the given source offset
    pub fn lex(position: usize, msg: impl Into<String>) -> Self {
        Error::Lex {
            position,
            message: msg.into(),
        }
    }

    /// Creates a parse error anchored at a nearby token offset
    pub fn parse(position: usize, msg: impl Into<String>) -> Self {
        Error::Parse {
            position: Some(position),
            message: msg.into(),
        }
    }

    /// Creates a parse error with no position (e.g. unexpected end of input)
    pub fn parse_unanchored(msg: impl Into<String>) -> Self {
        Error::Parse {
            position: None,
            message: msg.into(),
        }
    }

    /// Creates a compiler error with a message
    pub fn compiler(msg: impl Into<String>) -> Self {
        Error::Compiler {
            message: msg.into(),
            cause: None,
        }
    }

    /// Creates a compiler error wrapping an inner cause
    pub fn compiler_with_cause(msg: impl Into<String>, cause: Error) -> Self {
        Error::Compiler {
            message: msg.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config {
            message: msg.into(),
        }
    }

    /// Returns the message without any position context
    pub fn base_message(&self) -> String {
        self.to_string()
    }

    /// Returns the source offset this error is anchored at, if any
    pub fn position(&self) -> Option<usize> {
        match self {
            Error::Lex { position, .. } => Some(*position),
            Error::Parse { position, .. } => *position,
            Error::Compiler { .. } | Error::Config { .. } => None,
        }
    }

    /// Renders the full one-line message with best-available position context
    ///
    /// Produces `"<message> on line L, column C"`, appending
    /// ` of macro "name"` when the position lies inside a macro expansion.
    /// Degrades to the base message when no position is available. Pure and
    /// idempotent: calling it twice with the same positions yields the same
    /// string.
    pub fn generate_message(&self, positions: &SourcePositions) -> String {
        match self.position() {
            Some(pos) => {
                let (line, column) = positions.line_column(pos);
                match positions.macro_at(pos) {
                    Some(name) => format!(
                        "{} on line {}, column {} of macro \"{}\"",
                        self.base_message(),
                        line,
                        column,
                        name
                    ),
                    None => format!(
                        "{} on line {}, column {}",
                        self.base_message(),
                        line,
                        column
                    ),
                }
            }
            None => self.base_message(),
        }
    }
}

/// Result type for Forgescript operations
pub type Result<T> = std::result::Result<T, Error>;

/// Position-to-line/column service owned by the enclosing lex/parse context
///
/// Built once from the raw source text; offsets inside registered macro
/// expansion ranges additionally report the macro name.
#[derive(Debug, Clone, Default)]
pub struct SourcePositions {
    /// Byte offset of the start of each line, ascending
    line_starts: Vec<usize>,
    /// Macro expansion ranges, non-overlapping
    expansions: Vec<MacroExpansion>,
}

/// One macro expansion range within the lexed text
#[derive(Debug, Clone)]
struct MacroExpansion {
    name: String,
    start: usize,
    end: usize,
}

impl SourcePositions {
    /// Builds the line table from the raw source text
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourcePositions {
            line_starts,
            expansions: Vec::new(),
        }
    }

    /// Registers a macro expansion covering `start..end`
    pub fn add_macro_expansion(&mut self, name: impl Into<String>, start: usize, end: usize) {
        self.expansions.push(MacroExpansion {
            name: name.into(),
            start,
            end,
        });
    }

    /// Maps a byte offset to a 1-indexed (line, column) pair
    pub fn line_column(&self, position: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&position) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (line_idx + 1, position - self.line_starts[line_idx] + 1)
    }

    /// Returns the macro name whose expansion contains `position`, if any
    pub fn macro_at(&self, position: usize) -> Option<&str> {
        self.expansions
            .iter()
            .find(|e| position >= e.start && position < e.end)
            .map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column_mapping() {
        let positions = SourcePositions::new("abc\ndef\nghi");
        assert_eq!(positions.line_column(0), (1, 1));
        assert_eq!(positions.line_column(2), (1, 3));
        assert_eq!(positions.line_column(4), (2, 1));
        assert_eq!(positions.line_column(10), (3, 3));
    }

    #[test]
    fn test_generate_message_with_position() {
        let positions = SourcePositions::new("var x\nvar y");
        let err = Error::lex(8, "unexpected character");
        assert_eq!(
            err.generate_message(&positions),
            "unexpected character on line 2, column 3"
        );
    }

    #[test]
    fn test_generate_message_without_position() {
        let positions = SourcePositions::new("var x");
        let err = Error::parse_unanchored("unexpected end of input");
        assert_eq!(err.generate_message(&positions), "unexpected end of input");
        let err = Error::compiler("unresolved function");
        assert_eq!(err.generate_message(&positions), "unresolved function");
    }

    #[test]
    fn test_generate_message_inside_macro() {
        let mut positions = SourcePositions::new("one two three");
        positions.add_macro_expansion("SPEED", 4, 7);
        let err = Error::lex(5, "bad token");
        assert_eq!(
            err.generate_message(&positions),
            "bad token on line 1, column 6 of macro \"SPEED\""
        );
        // Idempotent: a second render is byte-identical.
        assert_eq!(
            err.generate_message(&positions),
            "bad token on line 1, column 6 of macro \"SPEED\""
        );
    }

    #[test]
    fn test_compiler_error_with_cause() {
        let inner = Error::lex(3, "bad digit");
        let err = Error::compiler_with_cause("macro expansion failed", inner.clone());
        assert_eq!(err.base_message(), "macro expansion failed");
        match err {
            Error::Compiler { cause, .. } => assert_eq!(*cause.unwrap(), inner),
            _ => panic!("expected compiler error"),
        }
    }
}
