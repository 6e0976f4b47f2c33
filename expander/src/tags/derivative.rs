//! `@d1[expr, index, stencil]` and `@d2[expr, index1, index2, d1, d2]`.

use std::rc::Rc;

use crate::block::Block;
use crate::context::{Context, Flow, ScopeKind, TokenStream};
use crate::derivative::{DerivativeSlots, FirstDerivativeBlock, SecondDerivativeBlock};
use crate::error::{DiagnosticError, ExpandError};
use crate::tags::{TagCall, TagHandler};
use crate::variable::{Numeric, Stencil, parse_literal};

pub struct FirstDerivative;

impl TagHandler for FirstDerivative {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(3..=3, "exactly 3 arguments")?;
        let index = index_arg(call, 1, ctx)?;
        let stencil = stencil_arg(call, 2, ctx)?;

        let slots = Rc::new(DerivativeSlots::new(vec![index]));
        let expr = ctx.parse_sequence(&call.args[0], ScopeKind::Derivative(slots.clone()))?;
        ctx.push_block(Block::FirstDerivative(FirstDerivativeBlock {
            stencil,
            slots,
            expr: Box::new(expr),
        }));
        Ok(Flow::Continue)
    }
}

pub struct SecondDerivative;

impl TagHandler for SecondDerivative {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(5..=5, "exactly 5 arguments")?;
        let index1 = index_arg(call, 1, ctx)?;
        let index2 = index_arg(call, 2, ctx)?;
        let d1 = stencil_arg(call, 3, ctx)?;
        let d2 = stencil_arg(call, 4, ctx)?;

        let slots = Rc::new(DerivativeSlots::new(vec![index1, index2]));
        let expr = ctx.parse_sequence(&call.args[0], ScopeKind::Derivative(slots.clone()))?;
        ctx.push_block(Block::SecondDerivative(SecondDerivativeBlock {
            d1,
            d2,
            slots,
            expr: Box::new(expr),
        }));
        Ok(Flow::Continue)
    }
}

/// A derivative index: a numeric variable in scope, or a literal.
fn index_arg(call: &TagCall<'_>, index: usize, ctx: &Context<'_>) -> Result<Numeric, DiagnosticError> {
    let text = call.plain_arg(index)?;
    let name = text.trim();
    let resolved = match ctx.lookup(name) {
        Some(var) => var.as_numeric(name),
        None => parse_literal(name).map(|n| Numeric::Constant(ctx.session().constant(n))),
    };
    resolved.map_err(|e| e.at(call.arg_pos(index)))
}

fn stencil_arg(call: &TagCall<'_>, index: usize, ctx: &Context<'_>) -> Result<Rc<Stencil>, DiagnosticError> {
    let text = call.plain_arg(index)?;
    let name = text.trim();
    let resolved = match ctx.lookup(name) {
        Some(var) => var.as_stencil(name),
        None => Err(ExpandError::Undeclared(name.to_string())),
    };
    resolved.map_err(|e| e.at(call.arg_pos(index)))
}

#[cfg(test)]
mod tests {
    use crate::error::ExpandError;
    use crate::expand_source;

    const STENCILS: &str = "@stencil[D1]@points[-1, 0, 1]@weights[-1/2, 0, 1/2]@end\
                            @stencil[D2]@points[-1, 0, 1]@weights[1, -2, 1]@end";

    #[test]
    fn first_derivative_over_centered_stencil() {
        let source = format!("{STENCILS}@defaultrange[0,0]@d1[u[[i#]], 0, D1]");
        assert_eq!(
            expand_source(&source).unwrap(),
            "( (-1/2) * (u[i0 + (-1)]) + (0) * (u[i0 + (0)]) + (1/2) * (u[i0 + (1)]) )"
        );
    }

    #[test]
    fn first_derivative_follows_a_counter_index() {
        let source = format!("{STENCILS}@defaultrange[0,1]@iterate[k=1..1]@d1[[u[[#]]], k, D1]@end");
        let output = expand_source(&source).unwrap();
        assert!(output.starts_with("( (-1/2) * (u[0][1 + (-1)])"));
        assert_eq!(output.matches(" * (u[").count(), 3);
    }

    #[test]
    fn second_derivative_term_counts() {
        let diagonal = format!("{STENCILS}@defaultrange[0,1]@d2[u[[#]], 1, 1, D1, D2]");
        assert_eq!(expand_source(&diagonal).unwrap().matches(") * (u").count(), 3);

        let mixed = format!("{STENCILS}@defaultrange[0,1]@d2[u[[#]], 0, 1, D1, D2]");
        assert_eq!(expand_source(&mixed).unwrap().matches(" * (u").count(), 9);
    }

    #[test]
    fn stencil_argument_must_be_a_stencil() {
        let err = expand_source("@defaultrange[0,1]@iterate[k=0..1]@d1[u[[#]], k, k]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::WrongKind { expected: "stencil", .. }));

        let err = expand_source("@d1[u, 0, D9]").unwrap_err();
        assert!(matches!(err.error, ExpandError::Undeclared(ref name) if name == "D9"));
        assert_eq!(err.pos.map(|p| p.column), Some(10));
    }

    #[test]
    fn derivative_needs_three_arguments() {
        let err = expand_source("@d1[u, 0]").unwrap_err();
        assert!(matches!(err.error, ExpandError::ArgumentCount { got: 2, .. }));
    }
}
