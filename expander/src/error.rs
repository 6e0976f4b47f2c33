use std::fmt;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use grx::{LexError, Position};
use thiserror::Error;

/// The broad class of a failure, independent of its concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lexical,
    Scope,
    Value,
    Usage,
    Convergence,
}

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("{}", .0.message())]
    Lex(#[from] LexError),

    // Scope
    #[error("unknown tag @{0}")]
    UnknownTag(String),
    #[error("unexpected @end")]
    UnexpectedEnd,
    #[error("@end[{found}] does not match the open @{expected}")]
    MismatchedEnd { expected: String, found: String },
    #[error("{0} is already declared in this context")]
    Redeclared(String),
    #[error("cannot use @{tag} outside of a @{scope}")]
    OutsideScope { tag: String, scope: &'static str },
    #[error("unexpected {0} inside @stencil")]
    UnexpectedInStencil(String),

    // Value
    #[error("'{0}' is not a valid number literal")]
    InvalidNumber(String),
    #[error("invalid range specification '{0}'")]
    InvalidRange(String),
    #[error("'{0}' is not declared in this context")]
    Undeclared(String),
    #[error("@{tag} expects {expected}, got {got}")]
    ArgumentCount {
        tag: String,
        expected: &'static str,
        got: usize,
    },
    #[error("'{name}' is a {found}, not a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected plain text")]
    ExpectedPlainText,
    #[error("{0} value omitted, but no @defaultrange defined")]
    MissingBound(&'static str),
    #[error("{0} requires a previously declared @defaultrange")]
    DefaultRangeRequired(&'static str),
    #[error("unknown array syntax '{0}'")]
    UnknownArraySyntax(String),
    #[error("unknown substitution mode '{0}'")]
    UnknownMode(String),
    #[error("invalid name '{0}'")]
    InvalidName(String),
    #[error("@{0} not defined for this @stencil")]
    MissingStencilPart(&'static str),
    #[error("@points and @weights should have an equal number of arguments ({points} and {weights})")]
    StencilMismatch { points: usize, weights: usize },
    #[error("{0} has already been @defined")]
    Redefined(String),
    #[error("cannot @define an empty match")]
    EmptyMatch,

    // Usage
    #[error("iteration counter is already active")]
    CounterActive,

    // Convergence
    #[error("substitution has not converged after {0} passes, suspect circular @defines")]
    NotConverged(usize),
}

impl ExpandError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExpandError::Lex(_) => ErrorCategory::Lexical,
            ExpandError::UnknownTag(_)
            | ExpandError::UnexpectedEnd
            | ExpandError::MismatchedEnd { .. }
            | ExpandError::Redeclared(_)
            | ExpandError::OutsideScope { .. }
            | ExpandError::UnexpectedInStencil(_) => ErrorCategory::Scope,
            ExpandError::CounterActive => ErrorCategory::Usage,
            ExpandError::NotConverged(_) => ErrorCategory::Convergence,
            _ => ErrorCategory::Value,
        }
    }

    /// Attach a source position.
    pub fn at(self, pos: Position) -> DiagnosticError {
        DiagnosticError::from(self).at(pos)
    }
}

/// An error enriched with the position of the token being processed when it
/// was raised, and the chain of tags it unwound through.
#[derive(Debug)]
pub struct DiagnosticError {
    pub error: ExpandError,
    pub pos: Option<Position>,
    /// Innermost first.
    pub trace: Vec<String>,
}

impl DiagnosticError {
    /// Set the position unless an inner frame already did.
    pub fn at(mut self, pos: Position) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
        self
    }

    /// Record an enclosing tag.
    pub fn within(mut self, tag: &str, pos: Position) -> Self {
        self.trace.push(format!("in @{} at {}", tag, pos));
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.error.category()
    }

    /// `LINE:COL: message`, or just the message when no position is known.
    pub fn short_message(&self) -> String {
        match self.pos {
            Some(pos) => format!("{}: {}", pos, self.error),
            None => self.error.to_string(),
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let diagnostic = match &self.error {
            ExpandError::Lex(lex) => lex.to_diagnostic(file_id),
            error => {
                let labels = match self.pos {
                    Some(pos) => vec![Label::primary(file_id, pos.span(1))],
                    None => Vec::new(),
                };
                Diagnostic::error()
                    .with_message(error.to_string())
                    .with_labels(labels)
            }
        };
        diagnostic.with_notes(self.trace.clone())
    }
}

impl From<ExpandError> for DiagnosticError {
    fn from(error: ExpandError) -> Self {
        DiagnosticError {
            error,
            pos: None,
            trace: Vec::new(),
        }
    }
}

impl From<LexError> for DiagnosticError {
    fn from(error: LexError) -> Self {
        let pos = error.pos;
        DiagnosticError {
            error: ExpandError::Lex(error),
            pos: Some(pos),
            trace: Vec::new(),
        }
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for DiagnosticError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_position_wins() {
        let err = ExpandError::CounterActive
            .at(Position::new(3, 4, 20))
            .at(Position::new(1, 1, 0));
        assert_eq!(err.pos, Some(Position::new(3, 4, 20)));
        assert_eq!(err.short_message(), "3:4: iteration counter is already active");
    }

    #[test]
    fn categories() {
        assert_eq!(ExpandError::UnexpectedEnd.category(), ErrorCategory::Scope);
        assert_eq!(
            ExpandError::InvalidNumber("x".into()).category(),
            ErrorCategory::Value
        );
        assert_eq!(ExpandError::NotConverged(10).category(), ErrorCategory::Convergence);
        let lex = LexError::unterminated_array_expansion(Position::START);
        assert_eq!(DiagnosticError::from(lex).category(), ErrorCategory::Lexical);
    }

    #[test]
    fn trace_becomes_notes() {
        let err = ExpandError::Undeclared("n".into())
            .at(Position::new(2, 9, 15))
            .within("iterate", Position::new(2, 1, 7));
        let diagnostic = err.to_diagnostic(0);
        assert_eq!(diagnostic.notes, vec!["in @iterate at 2:1".to_string()]);
        assert_eq!(diagnostic.labels[0].range, 15..16);
    }
}
