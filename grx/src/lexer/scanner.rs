use crate::lexer::ArgumentStyle;
use crate::lexer::error::LexError;
use crate::position::Position;
use crate::token::{Token, TokenSequence};

/// Characters a backslash turns into literal text.
const ESCAPABLE: [char; 5] = ['@', '[', ']', ',', '\\'];

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Single-pass character scanner over one (sub)string.
///
/// `positions[i]` is the position of `chars[i]`; there is one extra entry for
/// the position just past the end, so any `a..b` slice can be re-lexed with
/// `positions[a..=b]`.
pub(super) struct Scanner<'a> {
    chars: &'a [char],
    positions: &'a [Position],
    style: &'a dyn ArgumentStyle,
    tokens: Vec<Token>,
    text: String,
    text_start: Option<usize>,
}

impl<'a> Scanner<'a> {
    pub(super) fn new(
        chars: &'a [char],
        positions: &'a [Position],
        style: &'a dyn ArgumentStyle,
    ) -> Self {
        debug_assert_eq!(chars.len() + 1, positions.len());
        Scanner {
            chars,
            positions,
            style,
            tokens: Vec::new(),
            text: String::new(),
            text_start: None,
        }
    }

    pub(super) fn run(mut self) -> Result<TokenSequence, LexError> {
        let mut i = 0;

        while i < self.chars.len() {
            let c = self.chars[i];
            match c {
                '\\' if self.peek(i + 1).is_some_and(|n| ESCAPABLE.contains(&n)) => {
                    self.push_text(i, self.chars[i + 1]);
                    i += 2;
                }
                '@' => {
                    self.flush_text();
                    i = self.scan_tag(i)?;
                }
                '[' if self.peek(i + 1) == Some('[') => {
                    self.flush_text();
                    i = self.scan_array_expansion(i)?;
                }
                _ => {
                    self.push_text(i, c);
                    i += 1;
                }
            }
        }

        self.flush_text();
        Ok(TokenSequence::new(self.tokens, self.positions[0]))
    }

    fn peek(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    fn push_text(&mut self, at: usize, c: char) {
        if self.text_start.is_none() {
            self.text_start = Some(at);
        }
        self.text.push(c);
    }

    fn flush_text(&mut self) {
        if let Some(start) = self.text_start.take() {
            self.tokens.push(Token::Text {
                text: std::mem::take(&mut self.text),
                pos: self.positions[start],
            });
        }
    }

    /// Re-lex `chars[start..end]` as an independent document.
    fn sublex(&self, start: usize, end: usize) -> Result<TokenSequence, LexError> {
        Scanner::new(
            &self.chars[start..end],
            &self.positions[start..=end],
            self.style,
        )
        .run()
    }

    // -----------------------------------------------------------------------
    // TAG state
    // -----------------------------------------------------------------------

    /// Scan `@name` and an optional argument list. Returns the index after it.
    fn scan_tag(&mut self, at: usize) -> Result<usize, LexError> {
        let mut end = at + 1;
        while self
            .peek(end)
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            end += 1;
        }
        let name: String = self.chars[at + 1..end].iter().collect();

        let (args, next) = if self.peek(end) == Some('[') {
            self.scan_arguments(&name, at, end)?
        } else {
            (Vec::new(), end)
        };

        self.tokens.push(Token::Tag {
            name,
            args,
            pos: self.positions[at],
        });
        Ok(next)
    }

    /// Scan the bracketed list opening at `open`. Each argument is re-lexed.
    fn scan_arguments(
        &self,
        name: &str,
        at: usize,
        open: usize,
    ) -> Result<(Vec<TokenSequence>, usize), LexError> {
        let split = self.style.splits_arguments(name);
        let mut segments = Vec::new();
        let mut segment_start = open + 1;
        let mut depth = 1u32;
        let mut i = open + 1;

        let close = loop {
            let Some(c) = self.peek(i) else {
                return Err(LexError::unterminated_arguments(name, self.positions[at]));
            };
            match c {
                '\\' => {
                    i += 2;
                    continue;
                }
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        break i;
                    }
                }
                ',' if depth == 1 && split => {
                    segments.push((segment_start, i));
                    segment_start = i + 1;
                }
                _ => {}
            }
            i += 1;
        };
        segments.push((segment_start, close));

        if segments.len() == 1 && self.is_blank(segments[0].0, segments[0].1) {
            return Ok((Vec::new(), close + 1));
        }

        let mut args = Vec::with_capacity(segments.len());
        for (start, end) in segments {
            let (start, end) = self.unquote(start, end);
            args.push(self.sublex(start, end)?);
        }
        Ok((args, close + 1))
    }

    fn is_blank(&self, start: usize, end: usize) -> bool {
        self.chars[start..end].iter().all(|c| c.is_whitespace())
    }

    /// An argument that is exactly one balanced `[...]` group (ignoring
    /// surrounding whitespace, and not starting with `[[`) loses its brackets.
    fn unquote(&self, start: usize, end: usize) -> (usize, usize) {
        let mut a = start;
        let mut b = end;
        while a < b && self.chars[a].is_whitespace() {
            a += 1;
        }
        while b > a && self.chars[b - 1].is_whitespace() {
            b -= 1;
        }
        if b - a < 2 || self.chars[a] != '[' || self.chars[b - 1] != ']' {
            return (start, end);
        }
        if self.chars[a + 1] == '[' {
            return (start, end);
        }

        let mut depth = 0u32;
        let mut i = a;
        while i < b {
            match self.chars[i] {
                '\\' => {
                    i += 2;
                    continue;
                }
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return if i == b - 1 { (a + 1, b - 1) } else { (start, end) };
                    }
                }
                _ => {}
            }
            i += 1;
        }
        (start, end)
    }

    // -----------------------------------------------------------------------
    // ARRAY_EXPANSION state
    // -----------------------------------------------------------------------

    /// Scan `[[ body ]]` opening at `at`. Returns the index after the `]]`.
    fn scan_array_expansion(&mut self, at: usize) -> Result<usize, LexError> {
        let body_start = at + 2;
        let mut nested = 0u32;
        let mut single = 0u32;
        let mut i = body_start;

        let body_end = loop {
            let Some(c) = self.peek(i) else {
                return Err(LexError::unterminated_array_expansion(self.positions[at]));
            };
            match c {
                '\\' => i += 2,
                '[' if self.peek(i + 1) == Some('[') => {
                    nested += 1;
                    i += 2;
                }
                '[' => {
                    single += 1;
                    i += 1;
                }
                ']' if single > 0 => {
                    single -= 1;
                    i += 1;
                }
                ']' if self.peek(i + 1) == Some(']') => {
                    if nested == 0 {
                        break i;
                    }
                    nested -= 1;
                    i += 2;
                }
                _ => i += 1,
            }
        };

        let inner = self.sublex(body_start, body_end)?;
        self.tokens.push(Token::ArrayExpansion {
            inner,
            pos: self.positions[at],
        });
        Ok(body_end + 2)
    }
}
