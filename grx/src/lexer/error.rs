use std::fmt;

use codespan_reporting::diagnostic::{Diagnostic, Label};

use crate::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    /// `[[` without a matching `]]`.
    UnterminatedArrayExpansion,
    /// `@tag[` without a matching `]`.
    UnterminatedArguments { tag: String },
}

/// Lex errors, positioned at the construct that was left open.
#[derive(Debug, Clone)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub pos: Position,
}

impl LexError {
    pub fn unterminated_array_expansion(pos: Position) -> Self {
        LexError {
            kind: LexErrorKind::UnterminatedArrayExpansion,
            pos,
        }
    }

    pub fn unterminated_arguments(tag: impl Into<String>, pos: Position) -> Self {
        LexError {
            kind: LexErrorKind::UnterminatedArguments { tag: tag.into() },
            pos,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            LexErrorKind::UnterminatedArrayExpansion => "unterminated array expansion `[[`".to_string(),
            LexErrorKind::UnterminatedArguments { tag } => {
                format!("unterminated argument list for @{}", tag)
            }
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let width = match &self.kind {
            LexErrorKind::UnterminatedArrayExpansion => 2,
            LexErrorKind::UnterminatedArguments { tag } => tag.len() + 1,
        };
        Diagnostic::error()
            .with_message(self.message())
            .with_labels(vec![
                Label::primary(file_id, self.pos.span(width)).with_message("opened here"),
            ])
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message())
    }
}

impl std::error::Error for LexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_labels_the_opening_construct() {
        let err = LexError::unterminated_arguments("sum", Position::new(2, 3, 7));
        let diagnostic = err.to_diagnostic(0);
        assert_eq!(diagnostic.message, "unterminated argument list for @sum");
        assert_eq!(diagnostic.labels.len(), 1);
        assert_eq!(diagnostic.labels[0].range, 7..11);
        assert!(diagnostic.notes.is_empty());
        assert_eq!(err.to_string(), "2:3: unterminated argument list for @sum");
    }
}
