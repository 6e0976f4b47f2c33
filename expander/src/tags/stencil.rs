//! `@stencil[NAME] @points[...] @weights[...] @end`

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;

use crate::context::{Context, Flow, ScopeKind, TokenStream};
use crate::error::{DiagnosticError, ExpandError};
use crate::tags::{TagCall, TagHandler};
use crate::variable::{Stencil, Variable};

static VALID_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Points and weights collected while a `@stencil` scope is parsed.
#[derive(Debug, Default)]
pub struct StencilParts {
    pub points: Option<Vec<String>>,
    pub weights: Option<Vec<String>>,
}

pub struct StencilTag;

impl TagHandler for StencilTag {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, stream: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        call.arity(1..=1, "exactly 1 argument")?;
        let name = call.plain_arg(0)?.trim().to_string();
        if !VALID_NAME.is_match(&name) {
            return Err(ExpandError::InvalidName(name).at(call.arg_pos(0)));
        }

        let parts = Rc::new(RefCell::new(StencilParts::default()));
        let mut child = ctx.child(ScopeKind::Stencil(parts.clone()));
        child.parse(stream)?;
        drop(child);

        let StencilParts { points, weights } = parts.take();
        let points = points
            .filter(|p| !p.is_empty())
            .ok_or(ExpandError::MissingStencilPart("points"))?;
        let weights = weights
            .filter(|w| !w.is_empty())
            .ok_or(ExpandError::MissingStencilPart("weights"))?;
        let stencil = Stencil::new(points, weights)?;
        ctx.declare(&name, Variable::Stencil(Rc::new(stencil)))
            .map_err(|e| e.at(call.arg_pos(0)))?;
        Ok(Flow::Continue)
    }
}

/// `@points[...]` and `@weights[...]`, valid only directly inside `@stencil`.
pub enum StencilPart {
    Points,
    Weights,
}

impl TagHandler for StencilPart {
    fn parse(&self, call: &TagCall<'_>, ctx: &mut Context<'_>, _: &mut TokenStream<'_>) -> Result<Flow, DiagnosticError> {
        let ScopeKind::Stencil(parts) = ctx.kind() else {
            return Err(ExpandError::OutsideScope {
                tag: call.name.to_string(),
                scope: "stencil",
            }
            .at(call.pos));
        };

        let values = (0..call.args.len())
            .map(|i| call.plain_arg(i).map(|text| text.trim().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut parts = parts.borrow_mut();
        match self {
            StencilPart::Points => parts.points = Some(values),
            StencilPart::Weights => parts.weights = Some(values),
        }
        Ok(Flow::Continue)
    }
}
