//! Tag behaviors and the registry that maps tag names onto them.

pub mod definescope;
pub mod derivative;
pub mod end;
pub mod expand;
pub mod iterate;
pub mod settings;
pub mod stencil;

use std::collections::HashMap;
use std::ops::RangeBounds;

use grx::{ArgumentStyle, Position, TokenSequence};
use tracing::debug;

use crate::context::{Context, Flow, TokenStream};
use crate::error::{DiagnosticError, ExpandError};
use crate::text::plain_text;

/// A tag occurrence being parsed.
#[derive(Debug, Clone, Copy)]
pub struct TagCall<'t> {
    pub name: &'t str,
    pub args: &'t [TokenSequence],
    pub pos: Position,
}

impl<'t> TagCall<'t> {
    /// Fail with an argument-count error unless the number of arguments lies
    /// in `allowed`.
    pub fn arity(&self, allowed: impl RangeBounds<usize>, expected: &'static str) -> Result<(), DiagnosticError> {
        if allowed.contains(&self.args.len()) {
            Ok(())
        } else {
            Err(ExpandError::ArgumentCount {
                tag: self.name.to_string(),
                expected,
                got: self.args.len(),
            }
            .at(self.pos))
        }
    }

    /// Argument `index` as plain text.
    pub fn plain_arg(&self, index: usize) -> Result<String, DiagnosticError> {
        match self.args.get(index) {
            Some(arg) => plain_text(arg),
            None => Err(ExpandError::ArgumentCount {
                tag: self.name.to_string(),
                expected: "more arguments",
                got: self.args.len(),
            }
            .at(self.pos)),
        }
    }

    /// Position of argument `index`, falling back to the tag itself.
    pub fn arg_pos(&self, index: usize) -> Position {
        self.args.get(index).map_or(self.pos, |arg| arg.pos)
    }
}

/// The parse behavior of one tag.
pub trait TagHandler {
    /// Whether the lexer splits this tag's bracketed body on commas.
    fn splits_arguments(&self) -> bool {
        true
    }

    /// Parse `call` in `ctx`. Block-scoped tags continue reading `stream` in a
    /// child scope until `@end`.
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, stream: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError>;
}

/// Name to behavior table consulted for every tag token.
pub struct TagRegistry {
    handlers: HashMap<&'static str, Box<dyn TagHandler>>,
}

impl TagRegistry {
    pub fn empty() -> Self {
        TagRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Every built-in tag.
    pub fn standard() -> Self {
        let mut registry = TagRegistry::empty();
        registry.register("defaultrange", settings::DefaultRange);
        registry.register("arraysyntax", settings::ArraySyntaxTag);
        registry.register("expand", expand::Expand::Forward);
        registry.register("rexpand", expand::Expand::Reversed);
        registry.register("argexpand", expand::Expand::Arguments);
        registry.register("iterate", iterate::Iterate::Nested);
        registry.register("repeat", iterate::Iterate::Repeat);
        registry.register("sum", iterate::Iterate::Sum);
        registry.register("product", iterate::Iterate::Product);
        registry.register("d1", derivative::FirstDerivative);
        registry.register("d2", derivative::SecondDerivative);
        registry.register("stencil", stencil::StencilTag);
        registry.register("points", stencil::StencilPart::Points);
        registry.register("weights", stencil::StencilPart::Weights);
        registry.register("definescope", definescope::DefineScope);
        registry.register("define", definescope::Define);
        registry.register("end", end::End);
        registry
    }

    /// Add or replace the handler for `name`.
    pub fn register(&mut self, name: &'static str, handler: impl TagHandler + 'static) {
        self.handlers.insert(name, Box::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the handler for `call`. A name with no handler may still be a
    /// reference to a numeric variable.
    pub fn dispatch(
        &self,
        call: &TagCall<'_>,
        ctx: &mut Context<'_>,
        stream: &mut TokenStream<'_>,
    ) -> Result<Flow, DiagnosticError> {
        match self.handlers.get(call.name) {
            Some(handler) => {
                debug!(tag = call.name, pos = %call.pos, args = call.args.len(), "dispatch");
                handler
                    .parse(call, ctx, stream)
                    .map_err(|e| e.within(call.name, call.pos))
            }
            None => reference_variable(call, ctx),
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        TagRegistry::standard()
    }
}

impl ArgumentStyle for TagRegistry {
    fn splits_arguments(&self, tag: &str) -> bool {
        self.handlers
            .get(tag)
            .is_none_or(|handler| handler.splits_arguments())
    }
}

// `@n` renders the value of the numeric variable `n`.
fn reference_variable(call: &TagCall<'_>, ctx: &mut Context<'_>) -> Result<Flow, DiagnosticError> {
    let Some(var) = ctx.lookup(call.name) else {
        return Err(ExpandError::UnknownTag(call.name.to_string()).at(call.pos));
    };
    call.arity(..1, "no arguments on a variable reference")?;
    let block = var.block(call.name).map_err(|e| e.at(call.pos))?;
    ctx.push_block(block);
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_tags_take_one_unsplit_argument() {
        let registry = TagRegistry::standard();
        assert!(!registry.splits_arguments("expand"));
        assert!(!registry.splits_arguments("rexpand"));
        assert!(!registry.splits_arguments("argexpand"));
        assert!(registry.splits_arguments("iterate"));
        assert!(registry.splits_arguments("no_such_tag"));
    }

    #[test]
    fn arity_reports_the_tag() {
        let args = vec![TokenSequence::new(Vec::new(), Position::START)];
        let call = TagCall {
            name: "d1",
            args: &args,
            pos: Position::new(2, 3, 9),
        };
        assert!(call.arity(1..=1, "exactly 1 argument").is_ok());
        let err = call.arity(3..=3, "exactly 3 arguments").unwrap_err();
        assert_eq!(err.to_string(), "@d1 expects exactly 3 arguments, got 1");
        assert_eq!(err.pos, Some(Position::new(2, 3, 9)));
    }
}
