//! `@defaultrange` and `@arraysyntax`: store a setting on the current scope.

use tracing::debug;

use crate::config::ArraySyntax;
use crate::context::{Context, Flow, TokenStream};
use crate::error::DiagnosticError;
use crate::tags::{TagCall, TagHandler};
use crate::variable::parse_literal;

/// `@defaultrange[lo, hi]`
pub struct DefaultRange;

impl TagHandler for DefaultRange {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(2..=2, "exactly 2 arguments")?;
        let start = parse_literal(&call.plain_arg(0)?).map_err(|e| e.at(call.arg_pos(0)))?;
        let end = parse_literal(&call.plain_arg(1)?).map_err(|e| e.at(call.arg_pos(1)))?;
        debug!(start, end, "default range");
        ctx.settings_mut().default_range = Some((start, end));
        Ok(Flow::Continue)
    }
}

/// `@arraysyntax[C]` or `@arraysyntax[Fortran]`
pub struct ArraySyntaxTag;

impl TagHandler for ArraySyntaxTag {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(1..=1, "exactly 1 argument")?;
        let syntax = call
            .plain_arg(0)?
            .parse::<ArraySyntax>()
            .map_err(|e| e.at(call.arg_pos(0)))?;
        debug!(?syntax, "array syntax");
        ctx.settings_mut().array_syntax = Some(syntax);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ExpandError;
    use crate::expand_source;

    #[test]
    fn default_range_needs_two_literals() {
        let err = expand_source("@defaultrange[0]").unwrap_err();
        assert!(matches!(err.error, ExpandError::ArgumentCount { got: 1, .. }));

        let err = expand_source("@defaultrange[0, -2]").unwrap_err();
        assert!(matches!(err.error, ExpandError::InvalidNumber(ref s) if s == "-2"));
        assert_eq!(err.pos.map(|p| p.column), Some(17));
    }

    #[test]
    fn settings_are_scoped() {
        let output = expand_source("@defaultrange[0,1]@iterate[]@defaultrange[5,6]@end@expand[#]").unwrap();
        assert_eq!(output, "01");
    }

    #[test]
    fn unknown_array_syntax_is_rejected() {
        let err = expand_source("@arraysyntax[pascal]").unwrap_err();
        assert!(matches!(err.error, ExpandError::UnknownArraySyntax(_)));
    }
}
