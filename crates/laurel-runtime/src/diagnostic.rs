//! Compile-time diagnostics
//!
//! Every compile error flows through [`Diagnostic`] so the CLI, the REPL,
//! and tests all render errors identically.

use std::fmt;

use crate::span::Line;

/// Where in the source the error was reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At a concrete token; carries the token's text
    Token(String),
    /// At end of input
    AtEnd,
    /// No token context (lexical errors carry their message instead)
    Bare,
}

/// A compile error with its source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: Line,
    pub location: ErrorLocation,
    pub message: String,
}

impl Diagnostic {
    /// Error reported at a token
    pub fn at_token(line: Line, lexeme: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            location: ErrorLocation::Token(lexeme.into()),
            message: message.into(),
        }
    }

    /// Error reported at end of input
    pub fn at_end(line: Line, message: impl Into<String>) -> Self {
        Self {
            line,
            location: ErrorLocation::AtEnd,
            message: message.into(),
        }
    }

    /// Error with no token context
    pub fn bare(line: Line, message: impl Into<String>) -> Self {
        Self {
            line,
            location: ErrorLocation::Bare,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            ErrorLocation::Token(lexeme) => {
                write!(f, "[line {}] Error at '{}': {}", self.line, lexeme, self.message)
            }
            ErrorLocation::AtEnd => {
                write!(f, "[line {}] Error at end: {}", self.line, self.message)
            }
            ErrorLocation::Bare => write!(f, "[line {}] Error: {}", self.line, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_matches_the_reporting_format() {
        let at_token = Diagnostic::at_token(Line(3), "}", "Expect expression.");
        assert_eq!(
            at_token.to_string(),
            "[line 3] Error at '}': Expect expression."
        );

        let at_end = Diagnostic::at_end(Line(1), "Expect ';' after value.");
        assert_eq!(
            at_end.to_string(),
            "[line 1] Error at end: Expect ';' after value."
        );

        let bare = Diagnostic::bare(Line(2), "Unexpected character.");
        assert_eq!(bare.to_string(), "[line 2] Error: Unexpected character.");
    }
}
