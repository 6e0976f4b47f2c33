pub mod lexer;
pub mod position;
pub mod token;

pub use lexer::{ArgumentStyle, LexError, LexErrorKind, SplitAll, lex, lex_document};
pub use position::Position;
pub use token::{Token, TokenSequence};

/// A lexed grx document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Top-level tokens, in source order.
    pub tokens: TokenSequence,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
