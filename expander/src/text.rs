use std::mem;

use grx::{Token, TokenSequence};

use crate::block::Block;
use crate::context::Context;
use crate::error::{DiagnosticError, ExpandError};

/// Encloses variable names inside text. Only the `#` rewrite inserts it;
/// a separator written in the document is kept as literal text.
pub const SEPARATOR: char = '\u{1f}';

/// Turn a text token into blocks: literal fragments stay text, enclosed names
/// that resolve in `ctx` render that variable's value.
pub fn parse_text(text: &str, ctx: &mut Context<'_>) -> Result<(), ExpandError> {
    let counter = ctx
        .expansion_counter()
        .filter(|_| text.contains('#'))
        .map(|counter| format!("{SEPARATOR}{counter}{SEPARATOR}"));

    let mut blocks = Vec::new();
    let mut literal = String::new();
    for (n, chunk) in text.split(SEPARATOR).enumerate() {
        if n > 0 {
            literal.push(SEPARATOR);
        }
        let rewritten = counter.as_deref().map(|reference| chunk.replace('#', reference));
        let chunk = rewritten.as_deref().unwrap_or(chunk);

        for (i, piece) in chunk.split(SEPARATOR).enumerate() {
            if i % 2 == 1 {
                if let Some(var) = ctx.lookup(piece) {
                    if !literal.is_empty() {
                        blocks.push(Block::Text(mem::take(&mut literal)));
                    }
                    blocks.push(var.block(piece)?);
                    continue;
                }
            }
            literal.push_str(piece);
        }
    }
    if !literal.is_empty() {
        blocks.push(Block::Text(literal));
    }

    if !blocks.is_empty() {
        ctx.push_block(Block::sequence(blocks));
    }
    Ok(())
}

/// The concatenated text of a sequence made only of text tokens.
pub fn plain_text(sequence: &TokenSequence) -> Result<String, DiagnosticError> {
    let mut text = String::new();
    for token in sequence {
        match token {
            Token::Text { text: piece, .. } => text.push_str(piece),
            other => return Err(ExpandError::ExpectedPlainText.at(other.pos())),
        }
    }
    Ok(text)
}
