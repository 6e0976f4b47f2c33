use std::cell::Cell;
use std::rc::Rc;
use std::sync::LazyLock;

use grx::{Position, TokenSequence};
use regex::Regex;

use crate::block::Block;
use crate::context::Context;
use crate::text::plain_text;
use crate::error::{DiagnosticError, ExpandError};
use crate::variable::{Numeric, parse_literal};

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// A stateful integer range. Bounds are read when iteration starts, so they
/// may refer to enclosing counters.
#[derive(Debug)]
pub struct Counter {
    start: Numeric,
    end: Numeric,
    stride: i64,
    value: Cell<i64>,
    active: Cell<bool>,
}

impl Counter {
    /// Ascending from `start` to `end` inclusive.
    pub fn new(start: Numeric, end: Numeric) -> Self {
        Counter {
            start,
            end,
            stride: 1,
            value: Cell::new(0),
            active: Cell::new(false),
        }
    }

    /// Descending from `end` to `start` inclusive.
    pub fn reversed(start: Numeric, end: Numeric) -> Self {
        Counter {
            start: end,
            end: start,
            stride: -1,
            value: Cell::new(0),
            active: Cell::new(false),
        }
    }

    pub fn value(&self) -> i64 {
        self.value.get()
    }

    pub fn stride(&self) -> i64 {
        self.stride
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Start iterating. Fails if this counter is already being iterated.
    pub fn steps(&self) -> Result<Steps<'_>, ExpandError> {
        if self.active.get() {
            return Err(ExpandError::CounterActive);
        }
        self.active.set(true);
        Ok(Steps {
            counter: self,
            next: Some(self.start.value()),
            end: self.end.value(),
        })
    }
}

/// The live iteration of a counter; the counter is released when this drops.
pub struct Steps<'a> {
    counter: &'a Counter,
    /// `None` once stepping past the last value would leave `i64`.
    next: Option<i64>,
    end: i64,
}

impl Iterator for Steps<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let stride = self.counter.stride;
        let value = self.next?;
        let in_range = (stride > 0 && value <= self.end) || (stride < 0 && value >= self.end);
        if !in_range {
            return None;
        }
        self.counter.value.set(value);
        self.next = value.checked_add(stride);
        Some(value)
    }
}

impl Drop for Steps<'_> {
    fn drop(&mut self) {
        self.counter.active.set(false);
    }
}

// ---------------------------------------------------------------------------
// Iteration block
// ---------------------------------------------------------------------------

/// Produces `before`, then `content` once per step joined by `between`, then `after`.
#[derive(Debug)]
pub struct IterationBlock {
    pub counter: Rc<Counter>,
    pub content: Box<Block>,
    pub before: String,
    pub between: String,
    pub after: String,
    pub pos: Position,
}

impl IterationBlock {
    pub fn new(counter: Rc<Counter>, content: Block, pos: Position) -> Self {
        IterationBlock {
            counter,
            content: Box::new(content),
            before: String::new(),
            between: String::new(),
            after: String::new(),
            pos,
        }
    }

    pub fn decorated(mut self, before: &str, between: &str, after: &str) -> Self {
        self.before = before.to_string();
        self.between = between.to_string();
        self.after = after.to_string();
        self
    }

    pub fn execute(&self) -> Result<String, DiagnosticError> {
        let steps = self.counter.steps().map_err(|e| e.at(self.pos))?;
        let mut output = self.before.clone();
        for (i, _) in steps.enumerate() {
            if i > 0 {
                output.push_str(&self.between);
            }
            output.push_str(&self.content.execute()?);
        }
        output.push_str(&self.after);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Range specifications
// ---------------------------------------------------------------------------

static RANGE_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]\w*)\s*(?:=\s*(\w+)?\s*\.\.\s*(\w+)?)?\s*$").unwrap()
});

/// A parsed `name` / `name=lo..hi` argument.
#[derive(Debug)]
pub struct RangeSpec {
    pub name: String,
    pub counter: Rc<Counter>,
}

impl RangeSpec {
    /// Parse a range argument; bounds resolve against `ctx`, omitted bounds
    /// fall back to its default range.
    pub fn parse(arg: &TokenSequence, ctx: &Context<'_>) -> Result<RangeSpec, DiagnosticError> {
        let text = plain_text(arg)?;
        let caps = RANGE_SPEC
            .captures(&text)
            .ok_or_else(|| ExpandError::InvalidRange(text.trim().to_string()).at(arg.pos))?;

        let default = ctx.default_range();
        let start = resolve_bound(ctx, caps.get(2).map(|m| m.as_str()), default.map(|d| d.0), "start")
            .map_err(|e| e.at(arg.pos))?;
        let end = resolve_bound(ctx, caps.get(3).map(|m| m.as_str()), default.map(|d| d.1), "end")
            .map_err(|e| e.at(arg.pos))?;

        Ok(RangeSpec {
            name: caps[1].to_string(),
            counter: Rc::new(Counter::new(start, end)),
        })
    }
}

fn resolve_bound(
    ctx: &Context<'_>,
    bound: Option<&str>,
    default: Option<i64>,
    which: &'static str,
) -> Result<Numeric, ExpandError> {
    match bound {
        Some(name) => match ctx.lookup(name) {
            Some(var) => var.as_numeric(name),
            None => parse_literal(name)
                .map(|n| Numeric::Constant(ctx.session().constant(n)))
                .map_err(|_| ExpandError::Undeclared(name.to_string())),
        },
        None => default
            .map(|n| Numeric::Constant(ctx.session().constant(n)))
            .ok_or(ExpandError::MissingBound(which)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Constant;

    fn constant(n: i64) -> Numeric {
        Numeric::Constant(Rc::new(Constant(n)))
    }

    fn visit(counter: &Counter) -> Vec<i64> {
        counter.steps().unwrap().collect()
    }

    #[test]
    fn forward_visits_every_value_ascending() {
        let counter = Counter::new(constant(2), constant(5));
        assert_eq!(visit(&counter), vec![2, 3, 4, 5]);
        assert!(!counter.is_active());
    }

    #[test]
    fn range_ending_at_the_largest_value_terminates() {
        let counter = Counter::new(constant(i64::MAX - 1), constant(i64::MAX));
        assert_eq!(visit(&counter), vec![i64::MAX - 1, i64::MAX]);
        assert_eq!(
            crate::expand_source("@iterate[i=9223372036854775807..9223372036854775807]x@end").unwrap(),
            "x"
        );
    }

    #[test]
    fn reversed_visits_every_value_descending() {
        let counter = Counter::reversed(constant(2), constant(5));
        assert_eq!(counter.stride(), -1);
        assert_eq!(visit(&counter), vec![5, 4, 3, 2]);
    }

    #[test]
    fn empty_range_visits_nothing() {
        let counter = Counter::new(constant(3), constant(1));
        assert!(visit(&counter).is_empty());
    }

    #[test]
    fn bounds_follow_outer_counter() {
        let outer = Rc::new(Counter::new(constant(0), constant(2)));
        let inner = Counter::new(constant(0), Numeric::Counter(outer.clone()));
        let mut lengths = Vec::new();
        for _ in outer.steps().unwrap() {
            lengths.push(visit(&inner).len());
        }
        assert_eq!(lengths, vec![1, 2, 3]);
    }

    #[test]
    fn reentry_is_rejected() {
        let counter = Counter::new(constant(0), constant(1));
        let steps = counter.steps().unwrap();
        assert!(matches!(counter.steps(), Err(ExpandError::CounterActive)));
        drop(steps);
        assert_eq!(visit(&counter), vec![0, 1]);
    }

    #[test]
    fn nested_iteration_of_one_counter_fails() {
        let counter = Rc::new(Counter::new(constant(0), constant(1)));
        let inner = IterationBlock::new(counter.clone(), Block::Text("x".into()), Position::new(1, 5, 4));
        let outer = IterationBlock::new(counter.clone(), Block::Iteration(inner), Position::START);
        let err = outer.execute().unwrap_err();
        assert!(matches!(err.error, ExpandError::CounterActive));
        assert_eq!(err.pos, Some(Position::new(1, 5, 4)));
        assert!(!counter.is_active());
    }

    #[test]
    fn decoration_surrounds_and_separates() {
        let counter = Rc::new(Counter::new(constant(1), constant(3)));
        let block = IterationBlock::new(
            counter.clone(),
            Block::Value(Numeric::Counter(counter)),
            Position::START,
        )
        .decorated("(", " + ", ")");
        assert_eq!(block.execute().unwrap(), "(1 + 2 + 3)");
    }
}
