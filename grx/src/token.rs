use std::fmt::Write;

use crate::position::Position;

/// A lexed token. Tokens are immutable once produced; tag arguments and
/// array-expansion bodies carry their own, already lexed, sub-sequences.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Inert text, escapes already resolved.
    Text { text: String, pos: Position },
    /// `@name` or `@name[arg, arg, ...]`.
    Tag {
        name: String,
        args: Vec<TokenSequence>,
        pos: Position,
    },
    /// `[[ ... ]]`
    ArrayExpansion { inner: TokenSequence, pos: Position },
}

impl Token {
    pub fn pos(&self) -> Position {
        match self {
            Token::Text { pos, .. } => *pos,
            Token::Tag { pos, .. } => *pos,
            Token::ArrayExpansion { pos, .. } => *pos,
        }
    }
}

/// An ordered run of tokens, positioned at the start of the text it was lexed
/// from (which matters for empty sequences, e.g. an empty tag argument).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSequence {
    pub tokens: Vec<Token>,
    pub pos: Position,
}

impl TokenSequence {
    pub fn new(tokens: Vec<Token>, pos: Position) -> Self {
        TokenSequence { tokens, pos }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Render the token tree, one token per line, nested content indented.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_tokens(&self.tokens, 0, &mut out);
        out
    }
}

impl<'a> IntoIterator for &'a TokenSequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

fn dump_tokens(tokens: &[Token], depth: usize, out: &mut String) {
    let pad = ">>>> ".repeat(depth);
    for token in tokens {
        match token {
            Token::Text { text, pos } => {
                let _ = writeln!(out, "{}:\t{}{:?}", pos, pad, text);
            }
            Token::Tag { name, args, pos } => {
                let _ = writeln!(out, "{}:\t{}@{}", pos, pad, name);
                for (i, arg) in args.iter().enumerate() {
                    let _ = writeln!(out, "{}:\t{}>>>> [[ @{}.args[{}] ]]", arg.pos, pad, name, i);
                    dump_tokens(&arg.tokens, depth + 2, out);
                }
            }
            Token::ArrayExpansion { inner, pos } => {
                let _ = writeln!(out, "{}:\t{}[[ array expansion ]]", pos, pad);
                dump_tokens(&inner.tokens, depth + 1, out);
            }
        }
    }
}
