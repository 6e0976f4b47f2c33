//! Block-scoped loops over range specifications: `@iterate`, `@repeat`,
//! `@sum` and `@product`.

use std::rc::Rc;

use grx::Position;

use crate::block::Block;
use crate::context::{Context, Flow, ScopeKind, TokenStream};
use crate::error::DiagnosticError;
use crate::iteration::{Counter, IterationBlock, RangeSpec};
use crate::tags::{TagCall, TagHandler};
use crate::variable::{Numeric, Variable};

pub enum Iterate {
    /// Repeat the content; counters are local to the scope.
    Nested,
    /// Like `Nested`, but the counters stay declared after `@end`.
    Repeat,
    /// `((c) + (c) + ...)`
    Sum,
    /// `((c) * (c) * ...)`
    Product,
}

impl TagHandler for Iterate {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, stream: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        let kind = ScopeKind::Block {
            opener: call.name.to_string(),
        };

        let (counters, content) = match self {
            Iterate::Repeat => {
                let counters = declare_ranges(call, ctx)?;
                let mut child = ctx.child(kind);
                child.parse(stream)?;
                (counters, child.into_block())
            }
            Iterate::Nested | Iterate::Sum | Iterate::Product => {
                let mut child = ctx.child(kind);
                let counters = declare_ranges(call, &mut child)?;
                child.parse(stream)?;
                (counters, child.into_block())
            }
        };

        // The content is consumed up to `@end` even when there is nothing to
        // iterate over.
        if counters.is_empty() {
            return Ok(Flow::Continue);
        }

        let block = match self {
            Iterate::Nested | Iterate::Repeat => nest(counters, content, call.pos, None),
            Iterate::Sum => nest(counters, content, call.pos, Some(" + ")),
            Iterate::Product => nest(counters, content, call.pos, Some(" * ")),
        };
        ctx.push_block(block);
        Ok(Flow::Continue)
    }
}

/// Parse every argument as a range spec and declare its counter in `ctx`.
/// Later specs may bound themselves by earlier ones.
fn declare_ranges(call: &TagCall<'_>, ctx: &mut Context<'_>) -> Result<Vec<Rc<Counter>>, DiagnosticError> {
    let mut counters = Vec::with_capacity(call.args.len());
    for arg in call.args {
        let spec = RangeSpec::parse(arg, ctx)?;
        ctx.declare(&spec.name, Variable::Number(Numeric::Counter(spec.counter.clone())))
            .map_err(|e| e.at(arg.pos))?;
        counters.push(spec.counter);
    }
    Ok(counters)
}

// The first counter is the outermost loop. With an operator, every term and
// every level is parenthesised.
fn nest(counters: Vec<Rc<Counter>>, content: Block, pos: Position, operator: Option<&str>) -> Block {
    let mut block = match operator {
        Some(_) => Block::Sequence(vec![Block::text("("), content, Block::text(")")]),
        None => content,
    };
    for counter in counters.into_iter().rev() {
        let iteration = IterationBlock::new(counter, block, pos);
        block = Block::Iteration(match operator {
            Some(op) => iteration.decorated("(", op, ")"),
            None => iteration,
        });
    }
    block
}

#[cfg(test)]
mod tests {
    use crate::error::ExpandError;
    use crate::expand_source;

    #[test]
    fn iterate_repeats_with_counter_values() {
        assert_eq!(expand_source("@iterate[i=0..2]a@i @end").unwrap(), "a0 a1 a2 ");
    }

    #[test]
    fn later_ranges_follow_earlier_counters() {
        assert_eq!(
            expand_source("@iterate[i=0..2, j=0..i]@i@j,@end").unwrap(),
            "00,10,11,20,21,22,"
        );
    }

    #[test]
    fn omitted_bounds_use_the_default_range() {
        assert_eq!(expand_source("@defaultrange[2,3]@iterate[k]@k@end").unwrap(), "23");
        let err = expand_source("@iterate[k=..3]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::MissingBound("start")));
    }

    #[test]
    fn sum_and_product_parenthesise() {
        assert_eq!(expand_source("@sum[i=1..3]x@i@end").unwrap(), "((x1) + (x2) + (x3))");
        assert_eq!(
            expand_source("@product[i=0..1, j=0..1]a@i@j@end").unwrap(),
            "(((a00) * (a01)) * ((a10) * (a11)))"
        );
    }

    #[test]
    fn iterate_counters_are_local() {
        assert_eq!(expand_source("@iterate[i=0..0]@end@iterate[i=1..1]@i@end").unwrap(), "1");
    }

    #[test]
    fn repeat_counters_outlive_the_scope() {
        let err = expand_source("@repeat[i=0..1]x@end@iterate[i=0..1]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::Redeclared(ref name) if name == "i"));
    }

    #[test]
    fn empty_range_list_discards_content() {
        assert_eq!(expand_source("@iterate[]hidden@end after").unwrap(), " after");
    }

    #[test]
    fn invalid_range_is_reported_at_the_argument() {
        let err = expand_source("@iterate[i=0..1, 3x]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::InvalidRange(ref s) if s == "3x"));
        assert_eq!(err.pos.map(|p| p.column), Some(17));
        assert_eq!(err.trace, vec!["in @iterate at 1:1".to_string()]);
    }
}
