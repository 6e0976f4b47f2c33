//! `@definescope[mode] ... @end` and the `@define[match, replacement]`
//! entries inside it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::block::Block;
use crate::context::{Context, Flow, ScopeKind, TokenStream};
use crate::error::{DiagnosticError, ExpandError};
use crate::substitution::{DefinitionBlock, Mode, SubstitutionBlock, SubstitutionEnv};
use crate::tags::{TagCall, TagHandler};

pub struct DefineScope;

impl TagHandler for DefineScope {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, stream: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(..=1, "at most 1 argument")?;
        let mode = if call.args.is_empty() {
            Mode::default()
        } else {
            call.plain_arg(0)?
                .parse::<Mode>()
                .map_err(|e| e.at(call.arg_pos(0)))?
        };

        let env = Rc::new(RefCell::new(SubstitutionEnv::new(mode)));
        let mut child = ctx.child(ScopeKind::Definition(env.clone()));
        child.parse(stream)?;
        let content = child.into_block();

        ctx.push_block(Block::Substitution(SubstitutionBlock {
            env,
            content: Box::new(content),
            pos: call.pos,
        }));
        Ok(Flow::Continue)
    }
}

pub struct Define;

impl TagHandler for Define {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(2..=2, "exactly 2 arguments")?;
        let env = ctx.definition_env().ok_or_else(|| {
            ExpandError::OutsideScope {
                tag: call.name.to_string(),
                scope: "definescope",
            }
            .at(call.pos)
        })?;

        let matcher = ctx.parse_sequence(&call.args[0], ScopeKind::Argument)?;
        let replacement = ctx.parse_sequence(&call.args[1], ScopeKind::Argument)?;
        ctx.push_block(Block::Definition(DefinitionBlock {
            env,
            matcher: Box::new(matcher),
            replacement: Box::new(replacement),
            pos: call.pos,
        }));
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorCategory, ExpandError};
    use crate::expand_source;

    #[test]
    fn replace_mode_rewrites_content() {
        assert_eq!(
            expand_source("@definescope@define[N, 16]int a[N];@end").unwrap(),
            "int a[16];"
        );
    }

    #[test]
    fn directive_mode_emits_preprocessor_lines() {
        assert_eq!(
            expand_source("@definescope[pragma]@define[N, 16]\nint a[N];\n@end").unwrap(),
            "#define N 16\nint a[N];\n#undef N\n"
        );
    }

    #[test]
    fn table_restarts_on_every_repetition() {
        assert_eq!(
            expand_source("@iterate[i=0..1]@definescope@define[X, @i]X;@end@end").unwrap(),
            "0;1;"
        );
    }

    #[test]
    fn conflicting_definitions_fail() {
        let err = expand_source("@definescope@define[a, b]@define[a, c]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::Redefined(ref m) if m == "a"));
        assert_eq!(err.pos.map(|p| p.column), Some(26));
    }

    #[test]
    fn circular_definitions_fail_to_converge() {
        let err = expand_source("@definescope@define[x, xx]x@end").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Convergence);
    }

    #[test]
    fn define_needs_a_definescope() {
        let err = expand_source("@define[a, b]").unwrap_err();
        assert!(matches!(err.error, ExpandError::OutsideScope { scope: "definescope", .. }));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = expand_source("@definescope[inline]@end").unwrap_err();
        assert!(matches!(err.error, ExpandError::UnknownMode(ref m) if m == "inline"));
    }
}
