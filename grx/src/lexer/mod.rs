pub mod error;
mod scanner;

pub use error::{LexError, LexErrorKind};

use crate::Document;
use crate::position::Position;
use crate::token::TokenSequence;

/// Decides, per tag name, whether a tag's bracketed argument list is split on
/// top-level commas. The lexer knows nothing else about tags.
pub trait ArgumentStyle {
    fn splits_arguments(&self, tag: &str) -> bool;
}

/// Splits every argument list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitAll;

impl ArgumentStyle for SplitAll {
    fn splits_arguments(&self, _tag: &str) -> bool {
        true
    }
}

/// Lex `text` as if it started at `origin` in the enclosing document.
pub fn lex(
    text: &str,
    origin: Position,
    style: &dyn ArgumentStyle,
) -> Result<TokenSequence, LexError> {
    let chars: Vec<char> = text.chars().collect();
    let mut positions = Vec::with_capacity(chars.len() + 1);
    let mut pos = origin;
    for &c in &chars {
        positions.push(pos);
        pos = pos.advance(c);
    }
    positions.push(pos);

    scanner::Scanner::new(&chars, &positions, style).run()
}

/// Lex a complete source file.
pub fn lex_document(
    source: &str,
    source_id: usize,
    style: &dyn ArgumentStyle,
) -> Result<Document, LexError> {
    let tokens = lex(source, Position::START, style)?;
    Ok(Document { tokens, source_id })
}
