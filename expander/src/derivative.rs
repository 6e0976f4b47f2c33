use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::block::Block;
use crate::error::DiagnosticError;
use crate::iteration::Counter;
use crate::variable::{Numeric, Stencil};

/// The derivative indices of one `@d1`/`@d2` and the stencil point currently
/// substituted for each of them.
#[derive(Debug)]
pub struct DerivativeSlots {
    indices: Vec<Numeric>,
    points: Vec<RefCell<String>>,
    matched: Cell<bool>,
}

impl DerivativeSlots {
    pub fn new(indices: Vec<Numeric>) -> Self {
        let points = indices.iter().map(|_| RefCell::new(String::new())).collect();
        DerivativeSlots {
            indices,
            points,
            matched: Cell::new(false),
        }
    }

    fn index(&self, slot: usize) -> i64 {
        self.indices[slot].value()
    }

    fn set_point(&self, slot: usize, point: &str) {
        let mut current = self.points[slot].borrow_mut();
        current.clear();
        current.push_str(point);
    }

    /// The offset a placeholder appends at array index `value`: the point of
    /// the first slot whose index equals `value`, or nothing.
    pub fn delta(&self, value: i64) -> String {
        for (index, point) in self.indices.iter().zip(&self.points) {
            if index.value() == value {
                self.matched.set(true);
                return format!(" + ({})", point.borrow());
            }
        }
        String::new()
    }
}

/// Sits at the end of an array expansion's step inside a derivative
/// expression and emits the stencil offset for matching steps.
#[derive(Debug)]
pub struct PlaceholderBlock {
    pub counter: Rc<Counter>,
    pub slots: Rc<DerivativeSlots>,
}

impl PlaceholderBlock {
    pub fn execute(&self) -> String {
        self.slots.delta(self.counter.value())
    }
}

/// `( (w0) * (expr@p0) + (w1) * (expr@p1) + ... )`
#[derive(Debug)]
pub struct FirstDerivativeBlock {
    pub stencil: Rc<Stencil>,
    pub slots: Rc<DerivativeSlots>,
    pub expr: Box<Block>,
}

impl FirstDerivativeBlock {
    pub fn execute(&self) -> Result<String, DiagnosticError> {
        self.slots.matched.set(false);
        let mut terms = Vec::with_capacity(self.stencil.len());
        for (point, weight) in self.stencil.iter() {
            self.slots.set_point(0, point);
            terms.push(format!("({}) * ({})", weight, self.expr.execute()?));
        }
        debug!(terms = terms.len(), "first derivative expanded");
        Ok(render(&terms, self.slots.matched.get()))
    }
}

/// Diagonal (`index1 == index2`): one sum over the second-derivative stencil.
/// Off-diagonal: the outer product of the first-derivative stencil with itself.
#[derive(Debug)]
pub struct SecondDerivativeBlock {
    pub d1: Rc<Stencil>,
    pub d2: Rc<Stencil>,
    pub slots: Rc<DerivativeSlots>,
    pub expr: Box<Block>,
}

impl SecondDerivativeBlock {
    pub fn execute(&self) -> Result<String, DiagnosticError> {
        self.slots.matched.set(false);
        let index1 = self.slots.index(0);
        let index2 = self.slots.index(1);
        let mut terms = Vec::new();

        if index1 == index2 {
            for (point, weight) in self.d2.iter() {
                self.slots.set_point(0, point);
                self.slots.set_point(1, point);
                terms.push(format!("({}) * ({})", weight, self.expr.execute()?));
            }
        } else {
            for (point1, weight1) in self.d1.iter() {
                for (point2, weight2) in self.d1.iter() {
                    let (first, second) = if index1 < index2 {
                        (point1, point2)
                    } else {
                        (point2, point1)
                    };
                    self.slots.set_point(0, first);
                    self.slots.set_point(1, second);
                    terms.push(format!(
                        "({}) * ({}) * ({})",
                        weight1,
                        weight2,
                        self.expr.execute()?
                    ));
                }
            }
        }
        debug!(terms = terms.len(), diagonal = index1 == index2, "second derivative expanded");
        Ok(render(&terms, self.slots.matched.get()))
    }
}

// An expression that never referenced a derivative index does not vary
// along it.
fn render(terms: &[String], matched: bool) -> String {
    if !matched || terms.is_empty() {
        return "(0)".to_string();
    }
    format!("( {} )", terms.join(" + "))
}
