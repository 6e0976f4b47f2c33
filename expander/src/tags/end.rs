//! `@end` and `@end[label]`

use crate::context::{Context, Flow, TokenStream};
use crate::error::{DiagnosticError, ExpandError};
use crate::tags::{TagCall, TagHandler};

pub struct End;

impl TagHandler for End {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(..=1, "at most 1 argument")?;
        let Some(opener) = ctx.kind().opener() else {
            return Err(ExpandError::UnexpectedEnd.at(call.pos));
        };
        if !call.args.is_empty() {
            let label = call.plain_arg(0)?;
            let label = label.trim();
            if label != opener {
                return Err(ExpandError::MismatchedEnd {
                    expected: opener.to_string(),
                    found: label.to_string(),
                }
                .at(call.arg_pos(0)));
            }
        }
        Ok(Flow::LeaveScope)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ExpandError;
    use crate::expand_source;

    #[test]
    fn end_closes_the_innermost_scope() {
        assert_eq!(
            expand_source("@iterate[i=0..1]<@sum[j=0..1]@j@end[sum]>@end[iterate].").unwrap(),
            "<((0) + (1))><((0) + (1))>."
        );
    }

    #[test]
    fn mismatched_label_is_rejected() {
        let err = expand_source("@sum[i=0..1]x@end[iterate]").unwrap_err();
        assert!(matches!(
            err.error,
            ExpandError::MismatchedEnd { ref expected, ref found } if expected == "sum" && found == "iterate"
        ));
    }

    #[test]
    fn end_outside_a_block_is_unexpected() {
        let err = expand_source("text@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::UnexpectedEnd));
        assert_eq!(err.short_message(), "1:5: unexpected @end");

        let err = expand_source("@defaultrange[0,1]@expand[a@end]").unwrap_err();
        assert!(matches!(err.error, ExpandError::UnexpectedEnd));
    }

    #[test]
    fn unclosed_scope_runs_to_the_end_of_input() {
        assert_eq!(expand_source("@iterate[i=1..2]@i").unwrap(), "12");
    }
}
