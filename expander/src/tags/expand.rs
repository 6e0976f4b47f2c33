//! Repetition over the default range: `@expand`, `@rexpand`, `@argexpand`
//! and the `[[...]]` array-expansion shorthand.

use std::rc::Rc;

use grx::{Position, TokenSequence};
use tracing::debug;

use crate::block::Block;
use crate::config::ArraySyntax;
use crate::context::{Context, Flow, ScopeKind, TokenStream};
use crate::derivative::PlaceholderBlock;
use crate::error::{DiagnosticError, ExpandError};
use crate::iteration::{Counter, IterationBlock};
use crate::tags::{TagCall, TagHandler};
use crate::variable::{Numeric, Variable};

pub enum Expand {
    /// `@expand[body]`: ascending.
    Forward,
    /// `@rexpand[body]`: descending.
    Reversed,
    /// `@argexpand[body]`: ascending, joined by commas.
    Arguments,
}

impl TagHandler for Expand {
    fn splits_arguments(&self) -> bool {
        false
    }

    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(1..=1, "exactly 1 argument")?;
        let (start, end) = default_bounds(ctx, "expansion", call.pos)?;
        let counter = Rc::new(match self {
            Expand::Reversed => Counter::reversed(start, end),
            Expand::Forward | Expand::Arguments => Counter::new(start, end),
        });

        let content = expansion_body(&call.args[0], ctx, &counter)?;
        let block = IterationBlock::new(counter, content, call.pos);
        let block = match self {
            Expand::Arguments => block.decorated("", ",", ""),
            Expand::Forward | Expand::Reversed => block,
        };
        ctx.push_block(Block::Iteration(block));
        Ok(Flow::Continue)
    }
}

/// `[[body]]`: one array index per default-range step, formatted for the
/// declared array syntax. Inside a derivative expression each step also
/// carries the derivative's stencil offset.
pub fn parse_array_expansion(inner: &TokenSequence, pos: Position, ctx: &mut Context<'_>) -> Result<(), DiagnosticError> {
    let (start, end) = default_bounds(ctx, "array expansion", pos)?;
    let syntax = ctx.array_syntax();
    let counter = Rc::new(match syntax {
        Some(ArraySyntax::C) => Counter::reversed(start, end),
        _ => Counter::new(start, end),
    });

    let mut content = expansion_body(inner, ctx, &counter)?;
    if let ScopeKind::Derivative(slots) = ctx.kind() {
        content = Block::Sequence(vec![
            content,
            Block::Placeholder(PlaceholderBlock {
                counter: counter.clone(),
                slots: slots.clone(),
            }),
        ]);
    }

    let block = match syntax {
        Some(ArraySyntax::Fortran) => IterationBlock::new(counter, content, pos).decorated("(", ",", ")"),
        _ => {
            let step = Block::Sequence(vec![Block::text("["), content, Block::text("]")]);
            IterationBlock::new(counter, step, pos)
        }
    };
    ctx.push_block(Block::Iteration(block));
    Ok(())
}

fn default_bounds(ctx: &Context<'_>, what: &'static str, pos: Position) -> Result<(Numeric, Numeric), DiagnosticError> {
    let (start, end) = ctx
        .default_range()
        .ok_or_else(|| ExpandError::DefaultRangeRequired(what).at(pos))?;
    let session = ctx.session();
    Ok((
        Numeric::Constant(session.constant(start)),
        Numeric::Constant(session.constant(end)),
    ))
}

// Parse `body` in an expansion scope whose `#` names `counter`.
fn expansion_body(body: &TokenSequence, ctx: &Context<'_>, counter: &Rc<Counter>) -> Result<Block, DiagnosticError> {
    let name = ctx.session().fresh_name();
    debug!(counter = %name, stride = counter.stride(), "expansion counter");
    let mut child = ctx.child(ScopeKind::Expansion {
        counter: name.clone(),
    });
    child.declare(&name, Variable::Number(Numeric::Counter(counter.clone())))?;
    child.parse(&mut TokenStream::new(body))?;
    Ok(child.into_block())
}

#[cfg(test)]
mod tests {
    use crate::error::ExpandError;
    use crate::expand_source;

    #[test]
    fn expand_counts_up_and_rexpand_down() {
        assert_eq!(expand_source("@defaultrange[0,2]@expand[[x#]]").unwrap(), "x0x1x2");
        assert_eq!(expand_source("@defaultrange[0,2]@rexpand[[x#]]").unwrap(), "x2x1x0");
    }

    #[test]
    fn argexpand_joins_with_commas() {
        assert_eq!(expand_source("@defaultrange[1,3]f(@argexpand[a#, b])").unwrap(), "f(a1, b,a2, b,a3, b)");
    }

    #[test]
    fn hash_binds_to_the_innermost_expansion() {
        assert_eq!(
            expand_source("@defaultrange[0,2]@expand[#@expand[#]]").unwrap(),
            "001210122012"
        );
    }

    #[test]
    fn array_expansion_follows_array_syntax() {
        assert_eq!(expand_source("@defaultrange[0,2]u[[x#]]").unwrap(), "u[x0][x1][x2]");
        assert_eq!(
            expand_source("@defaultrange[0,2]@arraysyntax[C]u[[x#]]").unwrap(),
            "u[x2][x1][x0]"
        );
        assert_eq!(
            expand_source("@defaultrange[0,2]@arraysyntax[F90]u[[x#]]").unwrap(),
            "u(x0,x1,x2)"
        );
    }

    #[test]
    fn expansion_requires_default_range() {
        let err = expand_source("a @expand[#]").unwrap_err();
        assert!(matches!(err.error, ExpandError::DefaultRangeRequired("expansion")));
        assert_eq!(err.pos.map(|p| p.column), Some(3));

        let err = expand_source("u[[#]]").unwrap_err();
        assert!(matches!(err.error, ExpandError::DefaultRangeRequired("array expansion")));
    }
}
