//! Source location tracking

use std::fmt;

/// A 1-based source line number.
///
/// Laurel's bytecode keeps one line entry per instruction byte, so line
/// granularity is all the runtime ever needs for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Line(pub u32);

impl Line {
    /// First line of a source file
    pub fn first() -> Self {
        Line(1)
    }

    /// Advance to the following line
    pub fn next(self) -> Self {
        Line(self.0 + 1)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_one_based_and_ordered() {
        let first = Line::first();
        assert_eq!(first, Line(1));
        assert!(first < first.next());
        assert_eq!(first.next(), Line(2));
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(Line(42).to_string(), "42");
    }
}
