use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use grx::{Token, TokenSequence};
use tracing::debug;

use crate::block::Block;
use crate::config::{ArraySyntax, Settings};
use crate::derivative::DerivativeSlots;
use crate::error::{DiagnosticError, ExpandError};
use crate::session::Session;
use crate::substitution::SubstitutionEnv;
use crate::tags::stencil::StencilParts;
use crate::tags::{TagCall, expand};
use crate::text;
use crate::variable::Variable;

/// What a tag's parse step asks of the token loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop parsing the current scope; produced by `@end`.
    LeaveScope,
}

/// A cursor over a token slice. Block-scoped tags hand the cursor of their
/// own context to the child scope, so the child consumes the tokens that
/// follow the opening tag.
#[derive(Debug)]
pub struct TokenStream<'t> {
    tokens: &'t [Token],
    next: usize,
}

impl<'t> TokenStream<'t> {
    pub fn new(sequence: &'t TokenSequence) -> Self {
        TokenStream {
            tokens: &sequence.tokens,
            next: 0,
        }
    }
}

impl<'t> Iterator for TokenStream<'t> {
    type Item = &'t Token;

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.next)?;
        self.next += 1;
        Some(token)
    }
}

/// The role of a scope, which decides how some tokens parse inside it.
#[derive(Debug)]
pub enum ScopeKind {
    Root,
    /// A tag argument or other nested token sequence.
    Argument,
    /// A scope opened by a tag and closed by `@end`.
    Block { opener: String },
    /// The body of `@expand` and friends or of `[[...]]`; `#` names `counter`.
    Expansion { counter: String },
    /// The expression of `@d1`/`@d2`; array expansions here become placeholders.
    Derivative(Rc<DerivativeSlots>),
    Stencil(Rc<RefCell<StencilParts>>),
    Definition(Rc<RefCell<SubstitutionEnv>>),
}

impl ScopeKind {
    /// The tag name `@end` must match to close this scope, if `@end` may
    /// close it at all.
    pub fn opener(&self) -> Option<&str> {
        match self {
            ScopeKind::Block { opener } => Some(opener),
            ScopeKind::Stencil(_) => Some("stencil"),
            ScopeKind::Definition(_) => Some("definescope"),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ScopeKind::Root => "root",
            ScopeKind::Argument => "argument",
            ScopeKind::Block { .. } => "block",
            ScopeKind::Expansion { .. } => "expansion",
            ScopeKind::Derivative(_) => "derivative",
            ScopeKind::Stencil(_) => "stencil",
            ScopeKind::Definition(_) => "definition",
        }
    }
}

/// A lexical scope: its variables, settings and the blocks accumulated while
/// parsing it. Lookups walk outward through `parent`.
pub struct Context<'p> {
    session: &'p Session,
    parent: Option<&'p Context<'p>>,
    kind: ScopeKind,
    variables: HashMap<String, Variable>,
    settings: Settings,
    blocks: Vec<Block>,
}

impl<'p> Context<'p> {
    pub fn root(session: &'p Session, settings: Settings) -> Self {
        Context {
            session,
            parent: None,
            kind: ScopeKind::Root,
            variables: HashMap::new(),
            settings,
            blocks: Vec::new(),
        }
    }

    pub fn child(&self, kind: ScopeKind) -> Context<'_> {
        Context {
            session: self.session,
            parent: Some(self),
            kind,
            variables: HashMap::new(),
            settings: Settings::default(),
            blocks: Vec::new(),
        }
    }

    pub fn session(&self) -> &'p Session {
        self.session
    }

    pub fn kind(&self) -> &ScopeKind {
        &self.kind
    }

    pub fn lookup(&self, name: &str) -> Option<Variable> {
        match self.variables.get(name) {
            Some(var) => Some(var.clone()),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    /// Bind `name` in this scope. Shadowing a name visible from an outer
    /// scope is a redeclaration too.
    pub fn declare(&mut self, name: &str, var: Variable) -> Result<(), ExpandError> {
        if self.lookup(name).is_some() {
            return Err(ExpandError::Redeclared(name.to_string()));
        }
        debug!(var = name, kind = var.kind_name(), scope = self.kind.label(), "declare");
        self.variables.insert(name.to_string(), var);
        Ok(())
    }

    pub fn default_range(&self) -> Option<(i64, i64)> {
        self.settings
            .default_range
            .or_else(|| self.parent.and_then(|parent| parent.default_range()))
    }

    pub fn array_syntax(&self) -> Option<ArraySyntax> {
        self.settings
            .array_syntax
            .or_else(|| self.parent.and_then(|parent| parent.array_syntax()))
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Name of the counter `#` refers to here.
    pub fn expansion_counter(&self) -> Option<&str> {
        match &self.kind {
            ScopeKind::Expansion { counter } => Some(counter),
            _ => self.parent.and_then(|parent| parent.expansion_counter()),
        }
    }

    /// The substitution table of the nearest enclosing `@definescope`.
    pub fn definition_env(&self) -> Option<Rc<RefCell<SubstitutionEnv>>> {
        match &self.kind {
            ScopeKind::Definition(env) => Some(env.clone()),
            _ => self.parent.and_then(|parent| parent.definition_env()),
        }
    }

    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Parse tokens from `stream` until it is exhausted or a tag leaves the
    /// scope. Errors carry the position of the token being parsed.
    pub fn parse(&mut self, stream: &mut TokenStream<'_>) -> Result<(), DiagnosticError> {
        debug!(scope = self.kind.label(), "enter scope");
        while let Some(token) = stream.next() {
            let flow = self
                .parse_token(token, stream)
                .map_err(|e| e.at(token.pos()))?;
            if flow == Flow::LeaveScope {
                break;
            }
        }
        debug!(scope = self.kind.label(), blocks = self.blocks.len(), "leave scope");
        Ok(())
    }

    fn parse_token(&mut self, token: &Token, stream: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        if matches!(self.kind, ScopeKind::Stencil(_)) {
            check_stencil_token(token)?;
        }
        match token {
            Token::Text { text: content, .. } => {
                text::parse_text(content, self)?;
                Ok(Flow::Continue)
            }
            Token::Tag { name, args, pos } => {
                let call = TagCall {
                    name,
                    args,
                    pos: *pos,
                };
                let session = self.session;
                session.registry().dispatch(&call, self, stream)
            }
            Token::ArrayExpansion { inner, pos } => {
                expand::parse_array_expansion(inner, *pos, self)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Parse a nested sequence in a child scope of the given kind.
    pub fn parse_sequence(&self, sequence: &TokenSequence, kind: ScopeKind) -> Result<Block, DiagnosticError> {
        let mut child = self.child(kind);
        child.parse(&mut TokenStream::new(sequence))?;
        Ok(child.into_block())
    }

    pub fn into_block(self) -> Block {
        Block::sequence(self.blocks)
    }
}

/// Only whitespace, `@points`, `@weights` and `@end` may appear in a stencil.
fn check_stencil_token(token: &Token) -> Result<(), ExpandError> {
    match token {
        Token::Text { text, .. } if text.trim().is_empty() => Ok(()),
        Token::Text { .. } => Err(ExpandError::UnexpectedInStencil("text".into())),
        Token::Tag { name, .. } if matches!(name.as_str(), "points" | "weights" | "end") => Ok(()),
        Token::Tag { name, .. } => Err(ExpandError::UnexpectedInStencil(format!("tag @{}", name))),
        Token::ArrayExpansion { .. } => Err(ExpandError::UnexpectedInStencil("array expansion".into())),
    }
}
