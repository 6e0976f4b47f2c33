use std::fmt;
use std::ops::Range;

/// A location in the top-level document.
///
/// `line` and `column` are 1-based (columns count characters), `offset` is the
/// byte offset used for codespan-reporting labels. Recursive lexes start from
/// the absolute position of their substring, so positions never need rebasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// The first character of a document.
    pub const START: Position = Position {
        line: 1,
        column: 1,
        offset: 0,
    };

    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Position {
            line,
            column,
            offset,
        }
    }

    /// The position of the character following `c`.
    pub fn advance(self, c: char) -> Self {
        if c == '\n' {
            Position {
                line: self.line + 1,
                column: 1,
                offset: self.offset + c.len_utf8(),
            }
        } else {
            Position {
                line: self.line,
                column: self.column + 1,
                offset: self.offset + c.len_utf8(),
            }
        }
    }

    /// A byte span of `len` bytes starting here.
    pub fn span(&self, len: usize) -> Range<usize> {
        self.offset..self.offset + len
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines_and_bytes() {
        let pos = Position::START.advance('a').advance('é');
        assert_eq!(pos, Position::new(1, 3, 3));

        let pos = pos.advance('\n');
        assert_eq!(pos, Position::new(2, 1, 4));
    }

    #[test]
    fn display_is_line_colon_column() {
        assert_eq!(Position::new(4, 17, 90).to_string(), "4:17");
    }
}
